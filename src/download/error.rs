//! Error types for download tools.

use std::path::PathBuf;

use thiserror::Error;

use crate::fetch::FetchError;

/// Errors a [`DownloadTool`](super::DownloadTool) can return for one attempt.
///
/// Every variant is retried by the orchestrator; a spawn failure simply burns
/// its attempts.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The external program could not be started.
    #[error("failed to start {program}: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The external program exited unsuccessfully.
    #[error("{program} exited with {}: {stderr}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Exited {
        /// Program that failed.
        program: String,
        /// Exit code, if the process was not killed by a signal.
        code: Option<i32>,
        /// Last line of stderr.
        stderr: String,
    },

    /// The HTTP request for a direct download failed.
    #[error("download request failed: {source}")]
    Fetch {
        /// Underlying fetch error.
        #[source]
        source: FetchError,
    },

    /// Writing, renaming or copying the artifact failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// Path involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a fetch error.
    #[must_use]
    pub fn fetch(source: FetchError) -> Self {
        Self::Fetch { source }
    }
}
