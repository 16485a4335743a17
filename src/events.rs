//! Vocabulary for the structured event stream.
//!
//! Every user-facing event is a `tracing` event with a `severity` field and
//! one of two targets: [`OPERATIONAL`] for crawl progress and failures, and
//! [`ARTIFACT`] for per-artifact outcomes. Subscribers can route the two
//! channels independently (the binary writes the artifact channel to its own
//! log file).

use std::fmt;

/// Target for crawl progress, retries and failures.
pub const OPERATIONAL: &str = "mediacrawl::operational";

/// Target for per-artifact outcomes (saved, skipped, failed).
pub const ARTIFACT: &str = "mediacrawl::artifact";

/// Severity attached to every event as the `severity` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Progress information.
    Info,
    /// An artifact or link was stored.
    Success,
    /// Work was skipped because it was already done.
    Skip,
    /// Something failed but will be retried or tolerated.
    Warning,
    /// Something failed for good.
    Error,
}

impl Severity {
    /// Lowercase label used in the `severity` field.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Skip => "skip",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical channel of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Crawl progress and failures.
    Operational,
    /// Per-artifact outcomes.
    Artifact,
}

impl Channel {
    /// The tracing target for this channel.
    #[must_use]
    pub fn target(self) -> &'static str {
        match self {
            Self::Operational => OPERATIONAL,
            Self::Artifact => ARTIFACT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Info.to_string(), "info");
        assert_eq!(Severity::Success.as_str(), "success");
        assert_eq!(Severity::Skip.as_str(), "skip");
        assert_eq!(Severity::Warning.as_str(), "warning");
        assert_eq!(Severity::Error.as_str(), "error");
    }

    #[test]
    fn test_channel_targets_are_distinct_and_namespaced() {
        assert_ne!(Channel::Operational.target(), Channel::Artifact.target());
        assert!(Channel::Artifact.target().starts_with("mediacrawl::"));
    }
}
