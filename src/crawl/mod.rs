//! Pagination driver and run-wide state.
//!
//! A [`Crawler`] drains one [`Target`](crate::site::Target) at a time,
//! strictly page by page, and passes new links to a [`Handoff`]. The
//! counters live in a [`RunState`] threaded through by `&mut`.

mod driver;
mod handoff;
mod state;

pub use driver::{
    CrawlError, CrawlLimits, CrawlReport, Crawler, DEFAULT_MAX_ARTIFACTS, DEFAULT_PAGE_DELAY,
    DEFAULT_SKIP_THRESHOLD, StopReason,
};
pub use handoff::{DownloadHandoff, Handoff, RecordHandoff};
pub use state::{RunState, Totals};
