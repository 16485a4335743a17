//! Page fetching with host fallback and bounded retry rounds.
//!
//! The [`Fetcher`] turns one logical page URL into an ordered list of
//! candidate URLs (one per fallback host) and walks that list for a fixed
//! number of rounds, sleeping between rounds. Every non-2xx status is a
//! transient failure; only an exhausted set of rounds surfaces as an error.
//!
//! # Example
//!
//! ```no_run
//! use mediacrawl_core::fetch::{ClientSettings, Fetcher, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new(&ClientSettings::default())?;
//! let fetcher = Fetcher::new(client, RetryPolicy::default());
//! let hosts = vec!["https://mirror-a.example/".to_string(), "https://mirror-b.example/".to_string()];
//! let page = fetcher.fetch("browse/1/", &hosts).await?;
//! println!("{} bytes from {}", page.body.len(), page.url);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;
mod fetcher;
mod retry;

pub(crate) use client::map_send_error;
pub use client::{ClientSettings, HttpClient, Page, Transport};
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::FetchError;
pub use fetcher::{Fetcher, candidate_urls};
pub use retry::{Backoff, DEFAULT_FETCH_ROUNDS, DEFAULT_ROUND_DELAY, RetryPolicy};
