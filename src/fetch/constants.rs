//! Constants for the fetch module (timeouts).

/// Default HTTP connect timeout (20 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 20;

/// Default whole-request timeout (60 seconds).
pub const READ_TIMEOUT_SECS: u64 = 60;
