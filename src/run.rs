//! A whole run: target expansion, delivery wiring and the final summary.
//!
//! Targets are drained one after another. A configuration error ends only
//! the target it belongs to; the time budget and the artifact limit end
//! the run.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{error, info, warn};

use crate::config::RunSettings;
use crate::crawl::{
    CrawlReport, Crawler, DownloadHandoff, Handoff, RecordHandoff, RunState, StopReason, Totals,
};
use crate::download::{Destination, DownloadTool, Orchestrator, external_name_template};
use crate::events::{OPERATIONAL, Severity};
use crate::fetch::Transport;
use crate::site::{Delivery, SiteDefinition, Target, TargetMode};
use crate::store::{DedupStore, Scope};

/// The tools behind the two download delivery modes.
#[derive(Clone, Copy)]
pub struct Tools<'a> {
    /// Used by sites with `external` delivery.
    pub external: &'a dyn DownloadTool,
    /// Used by sites with `direct` delivery.
    pub direct: &'a dyn DownloadTool,
}

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// Final counters.
    pub totals: Totals,
    /// Listing links dropped as already seen.
    pub duplicates: u64,
    /// Wall-clock duration.
    pub elapsed: Duration,
    /// Last known final page per site.
    pub final_pages: BTreeMap<String, u32>,
    /// One report per target that ran to a stop condition.
    pub reports: Vec<CrawlReport>,
    /// Targets abandoned on a configuration error, with the error.
    pub failed_targets: Vec<(String, String)>,
    /// Targets never started because the run ended early.
    pub not_started: usize,
}

impl RunSummary {
    /// Emits the summary on the operational channel.
    pub fn log(&self) {
        let totals = self.totals;
        info!(
            target: OPERATIONAL,
            severity = %Severity::Info,
            found = totals.found,
            saved = totals.saved,
            skipped = totals.skipped,
            failed = totals.failed,
            duplicates = self.duplicates,
            elapsed_secs = self.elapsed.as_secs(),
            "run finished: found {}, {totals}",
            totals.found
        );
        for (site, page) in &self.final_pages {
            info!(target: OPERATIONAL, severity = %Severity::Info, site = %site, page, "last page with results");
        }
        for report in &self.reports {
            info!(
                target: OPERATIONAL,
                severity = %Severity::Info,
                unit = %report.target,
                pages = report.pages,
                reason = %report.stop,
                "target summary"
            );
        }
        for (target, err) in &self.failed_targets {
            error!(target: OPERATIONAL, severity = %Severity::Error, unit = %target, error = %err, "target failed");
        }
        if self.not_started > 0 {
            warn!(
                target: OPERATIONAL,
                severity = %Severity::Warning,
                not_started = self.not_started,
                "targets skipped after the run ended early"
            );
        }
    }
}

/// Expands the selected sites into targets.
///
/// Per site, in order: the index listing (when requested, or when no query
/// or category is configured), then every query, then every category, each
/// crossed with every combination of the site's facets. Facets named in
/// `settings.shuffle` have their value order randomised once per run, and
/// `shuffle_sites` randomises site order. A site using a facet that is not
/// configured is skipped with a warning.
pub fn build_targets<R: Rng + ?Sized>(
    sites: Vec<SiteDefinition>,
    settings: &RunSettings,
    rng: &mut R,
) -> Vec<Target> {
    let mut sites = sites;
    if settings.shuffle_sites {
        sites.shuffle(rng);
    }

    let mut facets = settings.facets.clone();
    for (name, values) in &mut facets {
        if settings.shuffle.contains(name) {
            values.shuffle(rng);
        }
    }

    let mut targets = Vec::new();
    for site in sites {
        let site_facets: Option<Vec<(String, Vec<String>)>> = site
            .facets
            .iter()
            .map(|name| facets.iter().find(|(n, _)| n == name).cloned())
            .collect();
        let Some(site_facets) = site_facets else {
            warn!(
                target: OPERATIONAL,
                severity = %Severity::Warning,
                site = %site.name,
                facets = ?site.facets,
                "site uses a facet with no configured values, skipping"
            );
            continue;
        };

        let modes = modes_for(&site, settings);
        if modes.is_empty() {
            info!(target: OPERATIONAL, severity = %Severity::Skip, site = %site.name, "nothing to crawl for site");
            continue;
        }

        let site = Arc::new(site);
        let combos = facet_product(&site_facets);
        for mode in modes {
            for combo in &combos {
                targets.push(Target::new(Arc::clone(&site), mode.clone(), combo.clone()));
            }
        }
    }
    targets
}

fn modes_for(site: &SiteDefinition, settings: &RunSettings) -> Vec<TargetMode> {
    let mut modes = Vec::new();
    let nothing_requested = settings.queries.is_empty() && settings.categories.is_empty();
    if site.supports_index() && (settings.use_index_page || nothing_requested) {
        modes.push(TargetMode::Index);
    }
    if site.supports_search() {
        modes.extend(settings.queries.iter().cloned().map(TargetMode::Search));
    }
    if site.supports_categories() {
        modes.extend(settings.categories.iter().cloned().map(TargetMode::Category));
    }
    modes
}

/// Every combination of facet values, first facet varying slowest.
fn facet_product(facets: &[(String, Vec<String>)]) -> Vec<Vec<(String, String)>> {
    facets.iter().fold(vec![Vec::new()], |acc, (name, values)| {
        acc.iter()
            .flat_map(|prefix| {
                values.iter().map(move |value| {
                    let mut next = prefix.clone();
                    next.push((name.clone(), value.clone()));
                    next
                })
            })
            .collect()
    })
}

/// Crawls `targets` in order and delivers every new link.
pub async fn run<T: Transport>(
    crawler: &Crawler<T>,
    tools: Tools<'_>,
    settings: &RunSettings,
    targets: &[Target],
) -> RunSummary {
    let mut state = RunState::new(settings.budget);
    let mut reports = Vec::new();
    let mut failed_targets = Vec::new();
    let mut started = 0;

    info!(
        target: OPERATIONAL,
        severity = %Severity::Info,
        targets = targets.len(),
        "run started"
    );

    for target in targets {
        if state.budget_exceeded() {
            warn!(target: OPERATIONAL, severity = %Severity::Warning, "{}", StopReason::BudgetExceeded);
            break;
        }
        started += 1;

        let handoff = handoff_for(target, tools, crawler.store(), settings);
        match crawler.crawl(target, &mut state, handoff.as_ref()).await {
            Ok(report) => {
                let ends_run = report.stop.ends_run();
                reports.push(report);
                if ends_run {
                    break;
                }
            }
            Err(e) => {
                error!(
                    target: OPERATIONAL,
                    severity = %Severity::Error,
                    unit = %target,
                    error = %e,
                    "target abandoned"
                );
                failed_targets.push((target.to_string(), e.to_string()));
            }
        }
    }

    RunSummary {
        totals: state.totals(),
        duplicates: state.duplicates(),
        elapsed: state.elapsed(),
        final_pages: state.final_pages().clone(),
        reports,
        failed_targets,
        not_started: targets.len() - started,
    }
}

fn handoff_for<'a>(
    target: &Target,
    tools: Tools<'a>,
    store: &'a DedupStore,
    settings: &RunSettings,
) -> Box<dyn Handoff + 'a> {
    let site = target.site();
    let orchestrator = |tool: &'a dyn DownloadTool| {
        Orchestrator::new(tool, store).with_retry(settings.download_attempts, settings.download_delay)
    };

    match site.delivery {
        Delivery::Record => Box::new(
            RecordHandoff::new(store, Scope::Magnets).admitted_into_scope(
                site.listing_scope == Scope::Magnets && site.detail_selector.is_none(),
            ),
        ),
        Delivery::External => Box::new(DownloadHandoff::new(
            orchestrator(tools.external),
            Destination {
                output_dir: settings.download_dir.join(target.group_name()),
                name_template: external_name_template(&site.name, target.tag()),
            },
        )),
        Delivery::Direct => Box::new(DownloadHandoff::new(
            orchestrator(tools.direct),
            Destination {
                output_dir: settings.library_dir.join(target.library_group()),
                name_template: String::new(),
            },
        )),
    }
}
