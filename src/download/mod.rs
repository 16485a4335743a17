//! Artifact delivery.
//!
//! A [`DownloadTool`] performs one attempt at turning a link into a stored
//! artifact. The [`Orchestrator`] wraps a tool with the downloaded-link
//! dedup check, a bounded attempt loop and the run counters.
//!
//! Two tools ship here:
//!
//! - [`YtDlpTool`] runs an external downloader per attempt
//! - [`DirectHttpTool`] streams the response body itself and applies the
//!   quality replacement policy before keeping the file
//!
//! # Example
//!
//! ```no_run
//! use mediacrawl_core::crawl::RunState;
//! use mediacrawl_core::download::{Destination, Orchestrator, YtDlpTool, external_name_template};
//! use mediacrawl_core::store::DedupStore;
//!
//! # async fn example() {
//! let store = DedupStore::new("./state");
//! let tool = YtDlpTool::new("yt-dlp");
//! let orchestrator = Orchestrator::new(&tool, &store);
//! let destination = Destination {
//!     output_dir: "./downloads/cats - Tube".into(),
//!     name_template: external_name_template("Tube", Some("cats")),
//! };
//! let mut state = RunState::default();
//! state.record_found();
//! let outcome = orchestrator
//!     .acquire("https://tube.example/watch/1", &destination, &mut state)
//!     .await;
//! println!("{outcome}: {}", state.totals());
//! # }
//! ```

mod direct;
mod error;
mod filename;
mod orchestrator;
mod tool;
mod ytdlp;

pub use direct::DirectHttpTool;
pub use error::ToolError;
pub use filename::{
    external_name_template, parse_content_disposition, response_filename, sanitize_filename,
};
pub use orchestrator::{
    AcquireOutcome, DEFAULT_DOWNLOAD_ATTEMPTS, DEFAULT_DOWNLOAD_DELAY, Destination, Orchestrator,
};
pub use tool::{DownloadTool, ToolOutcome, ToolRequest};
pub use ytdlp::YtDlpTool;
