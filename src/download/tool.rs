//! The seam between the orchestrator and whatever actually fetches an artifact.

use std::path::PathBuf;

use async_trait::async_trait;

use super::error::ToolError;

/// One artifact to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    /// Source URL.
    pub url: String,
    /// Directory the artifact lands in.
    pub output_dir: PathBuf,
    /// Output name template (tool-specific; ignored by direct downloads).
    pub name_template: String,
}

/// Successful result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// A new artifact is on disk. The path is known for direct downloads.
    Stored(Option<PathBuf>),
    /// The exact artifact was already present.
    AlreadyStored(PathBuf),
    /// A better copy of the same title is already stored.
    Superseded {
        /// The copy that was kept.
        kept: PathBuf,
    },
}

/// Fetches one artifact per call.
///
/// Implementations perform a single attempt; retries belong to the
/// [`Orchestrator`](super::Orchestrator).
#[async_trait]
pub trait DownloadTool: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Makes one attempt at `request`.
    async fn fetch(&self, request: &ToolRequest) -> Result<ToolOutcome, ToolError>;
}
