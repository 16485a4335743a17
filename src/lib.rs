//! Mediacrawl Core Library
//!
//! This library provides the crawl-dedupe-fetch pipeline behind the
//! `mediacrawl` tool: walk paginated listing pages, drop links already
//! seen, and fetch the artifacts behind the rest while keeping only the
//! best copy of each title.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`fetch`] - Page fetching with host fallback and retry rounds
//! - [`extract`] - CSS-selector link extraction and link filters
//! - [`store`] - Append-only flat-file dedup store
//! - [`site`] - Site catalog, targets and page URL templates
//! - [`crawl`] - Pagination driver and run counters
//! - [`quality`] - Artifact quality ranking and the replacement policy
//! - [`download`] - Download orchestrator, external and direct tools
//! - [`config`] - Config file parsing and resolved run settings
//! - [`run`] - Whole-run driver and summary
//! - [`events`] - Severity and channel vocabulary for log events
//!
//! Execution is strictly sequential: one target, one page, one link at a
//! time.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod crawl;
pub mod download;
pub mod events;
pub mod extract;
pub mod fetch;
pub mod quality;
pub mod run;
pub mod site;
pub mod store;
pub mod user_agent;

// Re-export commonly used types
pub use crawl::{CrawlLimits, CrawlReport, Crawler, RunState, StopReason, Totals};
pub use download::{AcquireOutcome, DirectHttpTool, DownloadTool, Orchestrator, YtDlpTool};
pub use fetch::{Fetcher, HttpClient, RetryPolicy};
pub use run::{RunSummary, Tools, build_targets};
pub use site::{SiteCatalog, Target};
pub use store::{DedupStore, Scope};
