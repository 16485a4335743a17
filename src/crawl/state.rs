//! Run-wide counters, passed by `&mut` through the crawl and download stages.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use crate::site::SkipAccounting;

/// A snapshot of the artifact counters.
///
/// `found == saved + skipped + failed + remaining` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Totals {
    /// New links handed to delivery.
    pub found: u64,
    /// Artifacts stored.
    pub saved: u64,
    /// Artifacts skipped (already downloaded or outranked).
    pub skipped: u64,
    /// Artifacts that failed after every attempt.
    pub failed: u64,
    /// Links handed off but not yet resolved.
    pub remaining: u64,
}

impl fmt::Display for Totals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "saved: {}, skipped: {}, failed: {}, remaining: {}",
            self.saved, self.skipped, self.failed, self.remaining
        )
    }
}

/// Mutable state for one run. Nothing here outlives the process.
#[derive(Debug, Clone)]
pub struct RunState {
    found: u64,
    saved: u64,
    skipped: u64,
    failed: u64,
    duplicates: u64,
    download_skip_streak: u32,
    duplicate_streak: u32,
    final_pages: BTreeMap<String, u32>,
    started: Instant,
    budget: Option<Duration>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new(None)
    }
}

impl RunState {
    /// Starts the clock. `budget` is the wall-clock limit for the whole run.
    #[must_use]
    pub fn new(budget: Option<Duration>) -> Self {
        Self {
            found: 0,
            saved: 0,
            skipped: 0,
            failed: 0,
            duplicates: 0,
            download_skip_streak: 0,
            duplicate_streak: 0,
            final_pages: BTreeMap::new(),
            started: Instant::now(),
            budget,
        }
    }

    /// Current counters.
    #[must_use]
    pub fn totals(&self) -> Totals {
        Totals {
            found: self.found,
            saved: self.saved,
            skipped: self.skipped,
            failed: self.failed,
            remaining: self.remaining(),
        }
    }

    /// Found links not yet saved, skipped or failed.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.found
            .saturating_sub(self.saved)
            .saturating_sub(self.skipped)
            .saturating_sub(self.failed)
    }

    /// Number of new links found so far.
    #[must_use]
    pub fn found(&self) -> u64 {
        self.found
    }

    /// Listing links dropped because they were already recorded.
    #[must_use]
    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Counts a new link headed for delivery.
    pub fn record_found(&mut self) {
        self.found += 1;
        self.duplicate_streak = 0;
    }

    /// Counts a listing link that was already recorded.
    pub fn record_duplicate(&mut self) {
        self.duplicates += 1;
        self.duplicate_streak += 1;
    }

    /// Counts a stored artifact.
    pub fn record_saved(&mut self) {
        self.saved += 1;
        self.download_skip_streak = 0;
    }

    /// Counts a skipped artifact.
    pub fn record_skipped(&mut self) {
        self.skipped += 1;
        self.download_skip_streak += 1;
    }

    /// Counts a failed artifact.
    pub fn record_failed(&mut self) {
        self.failed += 1;
    }

    /// Resets the per-target skip streaks.
    pub fn begin_target(&mut self) {
        self.download_skip_streak = 0;
        self.duplicate_streak = 0;
    }

    /// The streak that `accounting` watches.
    #[must_use]
    pub fn skip_streak(&self, accounting: SkipAccounting) -> u32 {
        match accounting {
            SkipAccounting::Downloads => self.download_skip_streak,
            SkipAccounting::Duplicates => self.duplicate_streak,
            SkipAccounting::None => 0,
        }
    }

    /// Remembers the last page known to exist for `site`.
    pub fn set_final_page(&mut self, site: &str, page: u32) {
        self.final_pages.insert(site.to_string(), page);
    }

    /// Last known final page per site.
    #[must_use]
    pub fn final_pages(&self) -> &BTreeMap<String, u32> {
        &self.final_pages
    }

    /// Time since the run started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Whether the wall-clock budget is spent.
    #[must_use]
    pub fn budget_exceeded(&self) -> bool {
        self.budget.is_some_and(|budget| self.elapsed() >= budget)
    }
}
