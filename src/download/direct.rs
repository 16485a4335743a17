//! Direct HTTP delivery into a quality-ranked library.
//!
//! The response headers name the artifact before its body is read, so an
//! outranked artifact is rejected without downloading the payload. Accepted
//! artifacts are streamed to a `.part` file, renamed into place, and only
//! then are the copies they supersede deleted.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::error::ToolError;
use super::filename::response_filename;
use super::tool::{DownloadTool, ToolOutcome, ToolRequest};
use crate::events::{ARTIFACT, Severity};
use crate::fetch::{FetchError, HttpClient, map_send_error};
use crate::quality::{
    ArtifactDescriptor, Decision, PARTIAL_SUFFIX, QualityLibrary, StoredArtifact, decide,
};

/// Downloads over HTTP and applies the quality replacement policy.
///
/// `request.output_dir` is the library root for the target; the artifact
/// lands in `<output_dir>/<tier>/<file>`. With a mirror configured, a copy
/// also goes to `<mirror>/<group>/<tier>/<file>` where `<group>` is the last
/// component of `output_dir`.
#[derive(Debug, Clone)]
pub struct DirectHttpTool {
    client: Client,
    mirror_root: Option<PathBuf>,
}

impl DirectHttpTool {
    /// Creates a tool sharing `client`'s connection pool.
    #[must_use]
    pub fn new(client: &HttpClient) -> Self {
        Self {
            client: client.inner().clone(),
            mirror_root: None,
        }
    }

    /// Copies every stored artifact under `mirror_root` as well.
    #[must_use]
    pub fn with_mirror(mut self, mirror_root: impl Into<PathBuf>) -> Self {
        self.mirror_root = Some(mirror_root.into());
        self
    }

    fn mirror_path(&self, request: &ToolRequest, descriptor: &ArtifactDescriptor) -> Option<PathBuf> {
        let root = self.mirror_root.as_ref()?;
        let group = request.output_dir.file_name()?;
        Some(
            root.join(group)
                .join(descriptor.tier.to_string())
                .join(&descriptor.file_name),
        )
    }

    async fn copy_to_mirror(&self, stored: &Path, mirror: &Path) {
        let result = async {
            if let Some(parent) = mirror.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::copy(stored, mirror).await
        }
        .await;
        if let Err(e) = result {
            warn!(
                target: ARTIFACT,
                severity = %Severity::Warning,
                path = %mirror.display(),
                error = %e,
                "failed to copy artifact to mirror"
            );
        }
    }
}

#[async_trait]
impl DownloadTool for DirectHttpTool {
    fn name(&self) -> &str {
        "direct"
    }

    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    async fn fetch(&self, request: &ToolRequest) -> Result<ToolOutcome, ToolError> {
        let url = request.url.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::fetch(map_send_error(url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::fetch(FetchError::http_status(url, status.as_u16())));
        }

        let file_name = response_filename(response.headers(), response.url().as_str());
        let descriptor = ArtifactDescriptor::parse(&file_name);
        debug!(file = %file_name, tier = %descriptor.tier, "artifact named");

        let library = QualityLibrary::new(&request.output_dir);
        let destination = library.destination(&descriptor);
        if destination.exists() {
            return Ok(ToolOutcome::AlreadyStored(destination));
        }

        let existing = library
            .existing_for(&descriptor.title)
            .map_err(|e| ToolError::io(library.root(), e))?;
        let superseded = match decide(&descriptor, &existing) {
            Decision::SkipNew { kept } => {
                info!(
                    target: ARTIFACT,
                    severity = %Severity::Skip,
                    file = %file_name,
                    kept = %kept.path.display(),
                    "outranked by stored copy"
                );
                return Ok(ToolOutcome::Superseded { kept: kept.path });
            }
            Decision::StoreNew => Vec::new(),
            Decision::StoreNewRemoveOld(old) => old,
        };

        store_replacing(
            response.bytes_stream(),
            url,
            &destination,
            &library,
            &superseded,
        )
        .await?;

        if let Some(mirror) = self.mirror_path(request, &descriptor) {
            self.copy_to_mirror(&destination, &mirror).await;
        }

        Ok(ToolOutcome::Stored(Some(destination)))
    }
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.as_os_str().to_owned();
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

/// Streams `body` into `destination` through a `.part` file, then deletes
/// `superseded`.
///
/// On any failure the partial file is removed and `superseded` is left in
/// place, so the library never ends up with no copy of the title.
async fn store_replacing<S, B, E>(
    body: S,
    url: &str,
    destination: &Path,
    library: &QualityLibrary,
    superseded: &[StoredArtifact],
) -> Result<u64, ToolError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ToolError::io(parent, e))?;
    }
    let partial = partial_path(destination);
    let stored = async {
        let bytes = stream_to_file(body, url, &partial).await?;
        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| ToolError::io(destination, e))?;
        Ok(bytes)
    }
    .await;
    let bytes = match stored {
        Ok(bytes) => bytes,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };
    debug!(path = %destination.display(), bytes, "artifact stored");

    // Only now that the new copy is complete.
    if !superseded.is_empty() {
        library.remove_superseded(superseded, destination);
    }
    Ok(bytes)
}

async fn stream_to_file<S, B, E>(body: S, url: &str, path: &Path) -> Result<u64, ToolError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: fmt::Display,
{
    let file = File::create(path)
        .await
        .map_err(|e| ToolError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut body = std::pin::pin!(body);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| ToolError::fetch(FetchError::body(url, e.to_string())))?;
        let chunk = chunk.as_ref();
        writer
            .write_all(chunk)
            .await
            .map_err(|e| ToolError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| ToolError::io(path, e))?;
    Ok(bytes_written)
}
