//! On-disk library of quality-ranked artifacts.
//!
//! Layout is `<root>/<tier>/<file>` where `<tier>` is e.g. `1080p.x265`, so a
//! title has at most one file per tier bucket once a replacement completes.

use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::descriptor::ArtifactDescriptor;
use super::policy::StoredArtifact;
use crate::events::{ARTIFACT, Severity};

/// Suffix of files still being written.
pub const PARTIAL_SUFFIX: &str = ".part";

/// A directory tree of stored artifacts.
#[derive(Debug, Clone)]
pub struct QualityLibrary {
    root: PathBuf,
}

impl QualityLibrary {
    /// Creates a library rooted at `root`. Nothing is touched on disk.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The library root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where `descriptor` is stored.
    #[must_use]
    pub fn destination(&self, descriptor: &ArtifactDescriptor) -> PathBuf {
        self.root
            .join(descriptor.tier.to_string())
            .join(&descriptor.file_name)
    }

    /// Every stored artifact whose normalized title equals `title`.
    ///
    /// A missing root yields an empty list. Partial downloads are ignored.
    ///
    /// # Errors
    ///
    /// Returns any I/O error other than a missing root.
    pub fn existing_for(&self, title: &str) -> io::Result<Vec<StoredArtifact>> {
        let mut found = Vec::new();
        match walk(&self.root, &mut |path| {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                return;
            };
            if name.ends_with(PARTIAL_SUFFIX) {
                return;
            }
            let descriptor = ArtifactDescriptor::parse(name);
            if descriptor.title == title {
                found.push(StoredArtifact {
                    path: path.to_path_buf(),
                    descriptor,
                });
            }
        }) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        found.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(found)
    }

    /// Deletes superseded artifacts, skipping `keep`.
    ///
    /// Call only after the replacement is fully stored. Failures are logged
    /// and counted; the new artifact stays in place either way.
    pub fn remove_superseded(&self, old: &[StoredArtifact], keep: &Path) -> usize {
        let mut removed = 0;
        for artifact in old {
            if artifact.path == keep {
                continue;
            }
            match fs::remove_file(&artifact.path) {
                Ok(()) => {
                    removed += 1;
                    debug!(
                        target: ARTIFACT,
                        severity = %Severity::Info,
                        path = %artifact.path.display(),
                        "removed superseded artifact"
                    );
                }
                Err(e) => warn!(
                    target: ARTIFACT,
                    severity = %Severity::Warning,
                    path = %artifact.path.display(),
                    error = %e,
                    "failed to remove superseded artifact"
                ),
            }
        }
        removed
    }
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            walk(&path, visit)?;
        } else {
            visit(&path);
        }
    }
    Ok(())
}
