//! Where new links go once they pass the listing dedup filter.

use async_trait::async_trait;
use tracing::info;

use super::state::RunState;
use crate::download::{Destination, Orchestrator};
use crate::events::{ARTIFACT, Severity};
use crate::store::{DedupStore, Scope};

/// Receives the new links of one page, in page order.
///
/// Implementations resolve every link to saved, skipped or failed before
/// returning, so the counters in `state` stay conserved.
#[async_trait]
pub trait Handoff: Send + Sync {
    /// Delivers `links`.
    async fn accept(&self, links: &[String], state: &mut RunState);
}

/// Delivery for sites whose dedup entry is the artifact itself.
#[derive(Debug, Clone, Copy)]
pub struct RecordHandoff<'a> {
    store: &'a DedupStore,
    scope: Scope,
    admitted_here: bool,
}

impl<'a> RecordHandoff<'a> {
    /// Records every accepted link into `scope`.
    #[must_use]
    pub fn new(store: &'a DedupStore, scope: Scope) -> Self {
        Self {
            store,
            scope,
            admitted_here: false,
        }
    }

    /// Set when the listing dedup filter writes accepted links straight
    /// into `scope`. An entry found there is then the link just admitted,
    /// so it counts as saved rather than skipped.
    #[must_use]
    pub fn admitted_into_scope(mut self, admitted: bool) -> Self {
        self.admitted_here = admitted;
        self
    }
}

#[async_trait]
impl Handoff for RecordHandoff<'_> {
    async fn accept(&self, links: &[String], state: &mut RunState) {
        for link in links {
            let present = self.store.exists(self.scope, link);
            if present && self.admitted_here {
                state.record_saved();
                info!(
                    target: ARTIFACT,
                    severity = %Severity::Success,
                    link = %link,
                    scope = self.scope.as_str(),
                    "recorded"
                );
            } else if present {
                state.record_skipped();
                info!(target: ARTIFACT, severity = %Severity::Skip, link = %link, "already recorded");
            } else if self.store.record(self.scope, link) {
                state.record_saved();
                info!(
                    target: ARTIFACT,
                    severity = %Severity::Success,
                    link = %link,
                    scope = self.scope.as_str(),
                    "recorded"
                );
            } else {
                state.record_failed();
            }
        }

        let totals = state.totals();
        info!(target: ARTIFACT, severity = %Severity::Info, "{totals}");
    }
}

/// Delivery through a [`DownloadTool`](crate::download::DownloadTool).
pub struct DownloadHandoff<'a> {
    orchestrator: Orchestrator<'a>,
    destination: Destination,
}

impl<'a> DownloadHandoff<'a> {
    /// Sends every accepted link to `orchestrator`, landing in `destination`.
    #[must_use]
    pub fn new(orchestrator: Orchestrator<'a>, destination: Destination) -> Self {
        Self {
            orchestrator,
            destination,
        }
    }

    /// Where artifacts land.
    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.destination
    }
}

#[async_trait]
impl Handoff for DownloadHandoff<'_> {
    async fn accept(&self, links: &[String], state: &mut RunState) {
        for link in links {
            self.orchestrator
                .acquire(link, &self.destination, state)
                .await;
        }
    }
}
