//! Per-link acquisition with a bounded number of tool attempts.

use std::fmt;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::tool::{DownloadTool, ToolOutcome, ToolRequest};
use crate::crawl::RunState;
use crate::events::{ARTIFACT, OPERATIONAL, Severity};
use crate::store::{DedupStore, Scope};

/// Default number of tool attempts per link.
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 10;

/// Default delay between tool attempts.
pub const DEFAULT_DOWNLOAD_DELAY: Duration = Duration::from_secs(5);

/// Where an artifact should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    /// Output directory.
    pub output_dir: std::path::PathBuf,
    /// Tool-specific output name template.
    pub name_template: String,
}

/// Terminal result for one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// A new artifact was stored and the link recorded.
    Saved,
    /// Nothing to do: already downloaded, already on disk, or outranked.
    Skipped,
    /// Every attempt failed.
    Failed,
}

impl fmt::Display for AcquireOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Saved => "saved",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// Drives a [`DownloadTool`] for each link and keeps the counters.
pub struct Orchestrator<'a> {
    tool: &'a dyn DownloadTool,
    store: &'a DedupStore,
    scope: Scope,
    attempts: u32,
    delay: Duration,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator recording into [`Scope::Downloaded`] with
    /// default attempts and delay.
    #[must_use]
    pub fn new(tool: &'a dyn DownloadTool, store: &'a DedupStore) -> Self {
        Self {
            tool,
            store,
            scope: Scope::Downloaded,
            attempts: DEFAULT_DOWNLOAD_ATTEMPTS,
            delay: DEFAULT_DOWNLOAD_DELAY,
        }
    }

    /// Sets the attempt ceiling (at least 1) and the delay between attempts.
    #[must_use]
    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.delay = delay;
        self
    }

    /// Sets the dedup scope that marks a link as downloaded.
    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Acquires the artifact behind `link`.
    ///
    /// A link already in the downloaded scope is skipped without touching
    /// the network. Otherwise the tool gets up to the configured number of
    /// attempts; any error consumes one attempt and is retried after the
    /// delay. Counters in `state` are updated and the running totals logged
    /// once the outcome is known.
    #[instrument(level = "debug", skip(self, destination, state), fields(tool = self.tool.name()))]
    pub async fn acquire(
        &self,
        link: &str,
        destination: &Destination,
        state: &mut RunState,
    ) -> AcquireOutcome {
        let outcome = self.attempt_all(link, destination).await;

        match outcome {
            AcquireOutcome::Saved => state.record_saved(),
            AcquireOutcome::Skipped => state.record_skipped(),
            AcquireOutcome::Failed => state.record_failed(),
        }

        let totals = state.totals();
        info!(
            target: ARTIFACT,
            severity = %Severity::Info,
            saved = totals.saved,
            skipped = totals.skipped,
            failed = totals.failed,
            remaining = totals.remaining,
            "{totals}"
        );
        outcome
    }

    async fn attempt_all(&self, link: &str, destination: &Destination) -> AcquireOutcome {
        if self.store.exists(self.scope, link) {
            info!(target: ARTIFACT, severity = %Severity::Skip, link, "already downloaded, skipping");
            return AcquireOutcome::Skipped;
        }

        let request = ToolRequest {
            url: link.to_string(),
            output_dir: destination.output_dir.clone(),
            name_template: destination.name_template.clone(),
        };

        for attempt in 1..=self.attempts {
            match self.tool.fetch(&request).await {
                Ok(ToolOutcome::Stored(path)) => {
                    self.store.record(self.scope, link);
                    info!(
                        target: ARTIFACT,
                        severity = %Severity::Success,
                        link,
                        path = ?path,
                        attempt,
                        "downloaded"
                    );
                    return AcquireOutcome::Saved;
                }
                Ok(ToolOutcome::AlreadyStored(path)) => {
                    self.store.record(self.scope, link);
                    info!(
                        target: ARTIFACT,
                        severity = %Severity::Skip,
                        link,
                        path = %path.display(),
                        "already on disk, skipping"
                    );
                    return AcquireOutcome::Skipped;
                }
                Ok(ToolOutcome::Superseded { kept }) => {
                    info!(
                        target: ARTIFACT,
                        severity = %Severity::Skip,
                        link,
                        kept = %kept.display(),
                        "better copy already stored, skipping"
                    );
                    return AcquireOutcome::Skipped;
                }
                Err(e) => {
                    warn!(
                        target: OPERATIONAL,
                        severity = %Severity::Warning,
                        link,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "download attempt failed"
                    );
                    if attempt < self.attempts {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }

        warn!(
            target: ARTIFACT,
            severity = %Severity::Error,
            link,
            attempts = self.attempts,
            "download failed"
        );
        AcquireOutcome::Failed
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::download::ToolError;

    /// Returns scripted results in order, repeating the last one.
    struct ScriptedTool {
        script: Mutex<Vec<Result<ToolOutcome, ()>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedTool {
        fn new(script: Vec<Result<ToolOutcome, ()>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl DownloadTool for ScriptedTool {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn fetch(&self, _request: &ToolRequest) -> Result<ToolOutcome, ToolError> {
            *self.calls.lock().unwrap() += 1;
            let mut script = self.script.lock().unwrap();
            let next = if script.len() > 1 {
                script.remove(0)
            } else {
                script[0].clone()
            };
            next.map_err(|()| ToolError::Exited {
                program: "scripted".to_string(),
                code: Some(1),
                stderr: String::new(),
            })
        }
    }

    fn destination() -> Destination {
        Destination {
            output_dir: PathBuf::from("/tmp/out"),
            name_template: "%(title)s.%(ext)s".to_string(),
        }
    }

    fn setup() -> (TempDir, DedupStore) {
        let dir = TempDir::new().unwrap();
        let store = DedupStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_already_downloaded_link_skips_without_tool_call() {
        let (_dir, store) = setup();
        store.record(Scope::Downloaded, "https://v.example/1");
        let tool = ScriptedTool::new(vec![Ok(ToolOutcome::Stored(None))]);
        let orchestrator = Orchestrator::new(&tool, &store);
        let mut state = RunState::default();
        state.record_found();

        let outcome = orchestrator
            .acquire("https://v.example/1", &destination(), &mut state)
            .await;

        assert_eq!(outcome, AcquireOutcome::Skipped);
        assert_eq!(tool.calls(), 0);
        assert_eq!(state.totals().skipped, 1);
    }

    #[tokio::test]
    async fn test_success_records_link() {
        let (_dir, store) = setup();
        let tool = ScriptedTool::new(vec![Ok(ToolOutcome::Stored(None))]);
        let orchestrator = Orchestrator::new(&tool, &store);
        let mut state = RunState::default();
        state.record_found();

        let outcome = orchestrator
            .acquire("https://v.example/2", &destination(), &mut state)
            .await;

        assert_eq!(outcome, AcquireOutcome::Saved);
        assert!(store.exists(Scope::Downloaded, "https://v.example/2"));
        assert_eq!(state.totals().saved, 1);
        assert_eq!(state.totals().remaining, 0);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let (_dir, store) = setup();
        let tool = ScriptedTool::new(vec![Err(()), Err(()), Ok(ToolOutcome::Stored(None))]);
        let orchestrator = Orchestrator::new(&tool, &store).with_retry(5, Duration::ZERO);
        let mut state = RunState::default();
        state.record_found();

        let outcome = orchestrator
            .acquire("https://v.example/3", &destination(), &mut state)
            .await;

        assert_eq!(outcome, AcquireOutcome::Saved);
        assert_eq!(tool.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_fails_without_recording() {
        let (_dir, store) = setup();
        let tool = ScriptedTool::new(vec![Err(())]);
        let orchestrator = Orchestrator::new(&tool, &store).with_retry(4, Duration::ZERO);
        let mut state = RunState::default();
        state.record_found();

        let outcome = orchestrator
            .acquire("https://v.example/4", &destination(), &mut state)
            .await;

        assert_eq!(outcome, AcquireOutcome::Failed);
        assert_eq!(tool.calls(), 4);
        assert!(!store.exists(Scope::Downloaded, "https://v.example/4"));
        assert_eq!(state.totals().failed, 1);
    }

    #[tokio::test]
    async fn test_superseded_is_skipped_and_not_recorded() {
        let (_dir, store) = setup();
        let tool = ScriptedTool::new(vec![Ok(ToolOutcome::Superseded {
            kept: PathBuf::from("/lib/2160p/a.torrent"),
        })]);
        let orchestrator = Orchestrator::new(&tool, &store);
        let mut state = RunState::default();
        state.record_found();

        let outcome = orchestrator
            .acquire("https://v.example/5", &destination(), &mut state)
            .await;

        assert_eq!(outcome, AcquireOutcome::Skipped);
        assert!(!store.exists(Scope::Downloaded, "https://v.example/5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_between_attempts_only() {
        let (_dir, store) = setup();
        let tool = ScriptedTool::new(vec![Err(())]);
        let orchestrator =
            Orchestrator::new(&tool, &store).with_retry(3, Duration::from_secs(5));
        let mut state = RunState::default();

        let started = tokio::time::Instant::now();
        orchestrator
            .acquire("https://v.example/6", &destination(), &mut state)
            .await;

        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }
}
