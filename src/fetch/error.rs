//! Error types for the fetch module.
//!
//! Every variant carries the URL it concerns so that retry warnings and the
//! final exhaustion error can be logged without extra context.

use thiserror::Error;

/// Errors that can occur while fetching a listing or detail page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, reset, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The response body was cut off or could not be decoded.
    #[error("truncated response body from {url}: {message}")]
    Body {
        /// The URL whose body failed.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The URL (or a fallback host) is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {source}")]
    ClientBuild {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },

    /// Every candidate failed in every retry round.
    #[error("giving up on {url} after {rounds} round(s); last error: {last}")]
    Exhausted {
        /// The requested (pre-fallback) URL.
        url: String,
        /// Number of rounds attempted.
        rounds: u32,
        /// The last error observed.
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a truncated-body error.
    pub fn body(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Body {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates an exhaustion error wrapping the last observed failure.
    pub fn exhausted(url: impl Into<String>, rounds: u32, last: FetchError) -> Self {
        Self::Exhausted {
            url: url.into(),
            rounds,
            last: Box::new(last),
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Network failures, timeouts, truncated bodies and every non-2xx status
    /// are transient. Malformed URLs and client construction failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } | Self::Body { .. } => {
                true
            }
            Self::InvalidUrl { .. } | Self::ClientBuild { .. } | Self::Exhausted { .. } => false,
        }
    }

    /// HTTP status of the failure, looking through [`FetchError::Exhausted`].
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::Exhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
