//! Default User-Agent strings.
//!
//! Listing sites reject obvious bot identifiers, so page fetches present a
//! desktop browser unless the configuration overrides it.

/// Desktop Firefox User-Agent used for page fetches and direct downloads.
const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:124.0) Gecko/20100101 Firefox/124.0";

/// Returns the default browser User-Agent.
#[must_use]
pub fn default_browser_user_agent() -> &'static str {
    BROWSER_USER_AGENT
}
