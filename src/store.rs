//! Append-only dedup store backed by flat text files.
//!
//! Each [`Scope`] maps to one file holding one entry per line. Membership is
//! answered by re-reading the file, so an entry appended earlier in the same
//! run is visible to the next check. Entries are never rewritten or removed.
//!
//! I/O failures never propagate: an unreadable file is treated as "not seen"
//! and a failed append is logged and reported as "not recorded". Downloading
//! something twice is preferred over aborting a run.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::events::{OPERATIONAL, Severity};

/// A named partition of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Magnet links collected by record-only sites.
    Magnets,
    /// Links seen on listing pages.
    Scraped,
    /// Links whose artifact was downloaded.
    Downloaded,
}

impl Scope {
    /// File name used when no override is configured.
    #[must_use]
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Magnets => "magnets.txt",
            Self::Scraped => "scraped_links.txt",
            Self::Downloaded => "downloaded_links.txt",
        }
    }

    /// Short label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Magnets => "magnets",
            Self::Scraped => "scraped-links",
            Self::Downloaded => "downloaded-links",
        }
    }
}

/// Flat-file persisted set, one file per [`Scope`].
#[derive(Debug, Clone)]
pub struct DedupStore {
    magnets: PathBuf,
    scraped: PathBuf,
    downloaded: PathBuf,
}

impl DedupStore {
    /// Creates a store with every scope under `root` using default file names.
    ///
    /// Nothing is created on disk until the first [`record`](Self::record).
    #[must_use]
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            magnets: root.join(Scope::Magnets.default_file_name()),
            scraped: root.join(Scope::Scraped.default_file_name()),
            downloaded: root.join(Scope::Downloaded.default_file_name()),
        }
    }

    /// Overrides the file backing `scope`.
    #[must_use]
    pub fn with_file(mut self, scope: Scope, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match scope {
            Scope::Magnets => self.magnets = path,
            Scope::Scraped => self.scraped = path,
            Scope::Downloaded => self.downloaded = path,
        }
        self
    }

    /// Path of the file backing `scope`.
    #[must_use]
    pub fn path(&self, scope: Scope) -> &Path {
        match scope {
            Scope::Magnets => &self.magnets,
            Scope::Scraped => &self.scraped,
            Scope::Downloaded => &self.downloaded,
        }
    }

    /// Whether `candidate` is already recorded in `scope`.
    #[must_use]
    pub fn exists(&self, scope: Scope, candidate: &str) -> bool {
        let path = self.path(scope);
        match fs::read(path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes)
                .lines()
                .any(|line| line == candidate),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                warn!(
                    target: OPERATIONAL,
                    severity = %Severity::Warning,
                    scope = scope.as_str(),
                    path = %path.display(),
                    error = %e,
                    "dedup store unreadable, assuming not seen"
                );
                false
            }
        }
    }

    /// Appends `candidate` to `scope` unless it is already present.
    ///
    /// Returns `true` only if a new line was written. Candidates containing a
    /// line break cannot be represented and are refused.
    pub fn record(&self, scope: Scope, candidate: &str) -> bool {
        if candidate.is_empty() || candidate.contains(['\n', '\r']) {
            warn!(
                target: OPERATIONAL,
                severity = %Severity::Warning,
                scope = scope.as_str(),
                candidate,
                "refusing to record empty or multi-line entry"
            );
            return false;
        }
        if self.exists(scope, candidate) {
            return false;
        }

        let path = self.path(scope);
        match append_line(path, candidate) {
            Ok(()) => {
                debug!(scope = scope.as_str(), candidate, "recorded");
                true
            }
            Err(e) => {
                warn!(
                    target: OPERATIONAL,
                    severity = %Severity::Warning,
                    scope = scope.as_str(),
                    path = %path.display(),
                    error = %e,
                    "failed to record entry"
                );
                false
            }
        }
    }
}

fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .append(true)
        .open(path)?;
    // An unterminated last line would merge with the new entry.
    if !ends_with_newline(&mut file)? {
        writeln!(file)?;
    }
    writeln!(file, "{line}")?;
    file.flush()
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, DedupStore) {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_exists_on_missing_file_is_false() {
        let (_dir, store) = store();
        assert!(!store.exists(Scope::Downloaded, "https://a.example/1"));
        assert!(!store.path(Scope::Downloaded).exists());
    }

    #[test]
    fn test_record_creates_file_lazily() {
        let (_dir, store) = store();
        assert!(store.record(Scope::Scraped, "https://a.example/1"));
        assert!(store.path(Scope::Scraped).exists());
        assert!(!store.path(Scope::Magnets).exists());
    }

    #[test]
    fn test_record_twice_writes_once() {
        let (_dir, store) = store();
        assert!(store.record(Scope::Downloaded, "x"));
        assert!(!store.record(Scope::Downloaded, "x"));
        assert!(store.exists(Scope::Downloaded, "x"));

        let contents = fs::read_to_string(store.path(Scope::Downloaded)).unwrap();
        assert_eq!(contents, "x\n");
    }

    #[test]
    fn test_scopes_are_isolated() {
        let (_dir, store) = store();
        store.record(Scope::Scraped, "https://a.example/1");
        assert!(!store.exists(Scope::Downloaded, "https://a.example/1"));
    }

    #[test]
    fn test_exists_matches_whole_lines_only() {
        let (_dir, store) = store();
        store.record(Scope::Magnets, "magnet:?xt=urn:btih:ABCDEF");
        assert!(!store.exists(Scope::Magnets, "magnet:?xt=urn:btih:ABC"));
    }

    #[test]
    fn test_record_refuses_multiline_candidates() {
        let (_dir, store) = store();
        assert!(!store.record(Scope::Scraped, "a\nb"));
        assert!(!store.record(Scope::Scraped, ""));
        assert!(!store.path(Scope::Scraped).exists());
    }

    #[test]
    fn test_with_file_creates_nested_parent() {
        let (dir, store) = store();
        let custom = dir.path().join("state").join("seen.txt");
        let store = store.with_file(Scope::Scraped, &custom);
        assert!(store.record(Scope::Scraped, "y"));
        assert_eq!(fs::read_to_string(custom).unwrap(), "y\n");
    }

    #[test]
    fn test_appends_preserve_existing_entries() {
        let (_dir, store) = store();
        fs::write(store.path(Scope::Downloaded), "old\n").unwrap();
        assert!(store.record(Scope::Downloaded, "new"));
        let contents = fs::read_to_string(store.path(Scope::Downloaded)).unwrap();
        assert_eq!(contents, "old\nnew\n");
    }

    #[test]
    fn test_append_after_unterminated_last_line_keeps_entries_apart() {
        let (_dir, store) = store();
        fs::write(store.path(Scope::Magnets), "old").unwrap();
        assert!(store.record(Scope::Magnets, "new"));
        assert_eq!(fs::read_to_string(store.path(Scope::Magnets)).unwrap(), "old\nnew\n");
        assert!(store.exists(Scope::Magnets, "old"));
        assert!(store.exists(Scope::Magnets, "new"));
        assert!(!store.record(Scope::Magnets, "old"));
    }

    #[test]
    fn test_invalid_utf8_line_does_not_hide_other_entries() {
        let (_dir, store) = store();
        fs::write(store.path(Scope::Scraped), b"caf\xe9\nhttps://a.example/1\n").unwrap();
        assert!(store.exists(Scope::Scraped, "https://a.example/1"));
        assert!(!store.record(Scope::Scraped, "https://a.example/1"));
    }

    #[test]
    fn test_unreadable_store_degrades_to_not_seen() {
        let (dir, store) = store();
        // A directory where the file should be makes reads fail.
        let blocked = dir.path().join("blocked");
        fs::create_dir(&blocked).unwrap();
        let store = store.with_file(Scope::Downloaded, &blocked);
        assert!(!store.exists(Scope::Downloaded, "x"));
        assert!(!store.record(Scope::Downloaded, "x"));
    }
}
