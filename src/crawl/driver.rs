//! Page-by-page traversal of one [`Target`].
//!
//! Each iteration renders the page URL, fetches it with host fallback,
//! extracts links, drops the ones already in the site's listing scope and
//! hands the rest to delivery. Traversal stops on the first of: a failed
//! fetch, an empty page, the page limit, the artifact limit, the skip
//! threshold, the run budget, or a template without a `{page}` field.

use std::fmt;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use super::handoff::Handoff;
use super::state::RunState;
use crate::events::{OPERATIONAL, Severity};
use crate::extract::{ExtractError, LinkExtractor, LinkFilter};
use crate::fetch::{FetchError, Fetcher, Transport};
use crate::site::{Filters, SiteDefinition, Target, TemplateError};
use crate::store::DedupStore;

/// Default cap on new links per run.
pub const DEFAULT_MAX_ARTIFACTS: u64 = 1000;

/// Default consecutive-skip threshold.
pub const DEFAULT_SKIP_THRESHOLD: u32 = 20;

/// Default politeness delay before every page after the first.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(5);

/// Numeric stop conditions. Zero disables a limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    /// Pages per target.
    pub max_pages: u32,
    /// New links per run, across all targets.
    pub max_artifacts: u64,
    /// Consecutive skips before a target is abandoned.
    pub skip_threshold: u32,
    /// Sleep before fetching page 2 and later.
    pub page_delay: Duration,
}

impl Default for CrawlLimits {
    fn default() -> Self {
        Self {
            max_pages: 0,
            max_artifacts: DEFAULT_MAX_ARTIFACTS,
            skip_threshold: DEFAULT_SKIP_THRESHOLD,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

impl CrawlLimits {
    /// Effective page limit: the tighter of the run and site limits.
    #[must_use]
    pub fn page_limit(&self, site_limit: Option<u32>) -> u32 {
        match (self.max_pages, site_limit.unwrap_or(0)) {
            (0, site) => site,
            (run, 0) => run,
            (run, site) => run.min(site),
        }
    }

    fn artifacts_exhausted(&self, found: u64) -> bool {
        self.max_artifacts > 0 && found >= self.max_artifacts
    }
}

/// Why traversal of a target ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A page could not be fetched from any host.
    FetchFailed,
    /// A page yielded no links.
    NoLinks,
    /// The page limit was reached.
    MaxPages,
    /// The run-wide artifact limit was reached.
    MaxArtifacts,
    /// Too many consecutive skips.
    SkipThreshold,
    /// The run's wall-clock budget is spent.
    BudgetExceeded,
    /// The listing has a single page.
    NotPaginated,
}

impl StopReason {
    /// Whether the whole run should stop, not just this target.
    #[must_use]
    pub fn ends_run(self) -> bool {
        matches!(self, Self::MaxArtifacts | Self::BudgetExceeded)
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FetchFailed => "fetch failed",
            Self::NoLinks => "no links",
            Self::MaxPages => "page limit reached",
            Self::MaxArtifacts => "artifact limit reached",
            Self::SkipThreshold => "skip threshold reached",
            Self::BudgetExceeded => "time budget exceeded",
            Self::NotPaginated => "single-page listing",
        })
    }
}

/// Configuration problems that end a target.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The page URL could not be built.
    #[error("{target}: {source}")]
    Template {
        /// Target description.
        target: String,
        /// Underlying error.
        #[source]
        source: TemplateError,
    },

    /// A selector or link pattern is invalid.
    #[error("{target}: {source}")]
    Extract {
        /// Target description.
        target: String,
        /// Underlying error.
        #[source]
        source: ExtractError,
    },

    /// The rendered URL or a host is malformed.
    #[error("{target}: {source}")]
    Fetch {
        /// Target description.
        target: String,
        /// Underlying error.
        #[source]
        source: FetchError,
    },
}

impl CrawlError {
    fn template(target: &Target, source: TemplateError) -> Self {
        Self::Template {
            target: target.to_string(),
            source,
        }
    }

    fn extract(target: &Target, source: ExtractError) -> Self {
        Self::Extract {
            target: target.to_string(),
            source,
        }
    }

    fn fetch(target: &Target, source: FetchError) -> Self {
        Self::Fetch {
            target: target.to_string(),
            source,
        }
    }
}

/// What one target's traversal did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlReport {
    /// Target description.
    pub target: String,
    /// Pages fetched successfully.
    pub pages: u32,
    /// Links handed to delivery.
    pub new_links: u64,
    /// Listing links dropped as already seen.
    pub duplicates: u64,
    /// Why traversal ended.
    pub stop: StopReason,
}

/// Drives the pagination loop for one target at a time.
pub struct Crawler<T> {
    fetcher: Fetcher<T>,
    store: DedupStore,
    limits: CrawlLimits,
    filters: Filters,
}

impl<T: Transport> Crawler<T> {
    /// Creates a crawler with default limits and no listing filters.
    #[must_use]
    pub fn new(fetcher: Fetcher<T>, store: DedupStore) -> Self {
        Self {
            fetcher,
            store,
            limits: CrawlLimits::default(),
            filters: Filters::default(),
        }
    }

    /// Sets the stop conditions.
    #[must_use]
    pub fn with_limits(mut self, limits: CrawlLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Sets sort/date/country filters applied to every listing URL.
    #[must_use]
    pub fn with_filters(mut self, filters: Filters) -> Self {
        self.filters = filters;
        self
    }

    /// The dedup store shared with delivery.
    #[must_use]
    pub fn store(&self) -> &DedupStore {
        &self.store
    }

    /// The fetcher used for listing and detail pages.
    #[must_use]
    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Stop conditions in effect.
    #[must_use]
    pub fn limits(&self) -> &CrawlLimits {
        &self.limits
    }

    /// Traverses `target` from page 1 until a stop condition fires.
    ///
    /// New links are recorded in the site's listing scope before they reach
    /// `handoff`; links already there are counted as duplicates and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError`] for configuration problems: an unusable
    /// template, selector or link pattern, or a malformed URL. Network
    /// failures end the target with [`StopReason::FetchFailed`] instead.
    #[instrument(level = "debug", skip_all, fields(unit = %target))]
    pub async fn crawl(
        &self,
        target: &Target,
        state: &mut RunState,
        handoff: &dyn Handoff,
    ) -> Result<CrawlReport, CrawlError> {
        let site = target.site();
        let extractors = Extractors::for_site(site).map_err(|e| CrawlError::extract(target, e))?;
        let page_limit = self.limits.page_limit(site.max_pages);

        state.begin_target();
        info!(
            target: OPERATIONAL,
            severity = %Severity::Info,
            unit = %target,
            page_limit,
            "crawling"
        );

        let mut report = CrawlReport {
            target: target.to_string(),
            pages: 0,
            new_links: 0,
            duplicates: 0,
            stop: StopReason::NoLinks,
        };
        let mut page: u32 = 1;

        let stop = loop {
            if state.budget_exceeded() {
                break StopReason::BudgetExceeded;
            }
            if page_limit > 0 && page > page_limit {
                break StopReason::MaxPages;
            }
            if self.limits.artifacts_exhausted(state.found()) {
                break StopReason::MaxArtifacts;
            }
            if page > 1
                && !target
                    .template(page)
                    .map_err(|e| CrawlError::template(target, e))?
                    .is_paginated()
            {
                break StopReason::NotPaginated;
            }

            let request = target
                .page_request(page, &self.filters)
                .map_err(|e| CrawlError::template(target, e))?;
            if page > 1 && !self.limits.page_delay.is_zero() {
                tokio::time::sleep(self.limits.page_delay).await;
            }

            let fetched = match self.fetcher.fetch(&request.url, &request.hosts).await {
                Ok(fetched) => fetched,
                Err(e @ (FetchError::InvalidUrl { .. } | FetchError::ClientBuild { .. })) => {
                    return Err(CrawlError::fetch(target, e));
                }
                Err(e) => {
                    error!(
                        target: OPERATIONAL,
                        severity = %Severity::Error,
                        unit = %target,
                        page,
                        error = %e,
                        "listing page unavailable"
                    );
                    break StopReason::FetchFailed;
                }
            };
            report.pages += 1;

            let links = extractors.listing.extract(&fetched.body, &fetched.url);
            info!(
                target: OPERATIONAL,
                severity = %Severity::Info,
                unit = %target,
                page,
                links = links.len(),
                "page fetched"
            );
            if links.is_empty() {
                break StopReason::NoLinks;
            }

            let fresh = self
                .admit(site, &extractors, links, state, &mut report)
                .await;
            if !fresh.is_empty() {
                handoff.accept(&fresh, state).await;
            }

            let threshold = self.limits.skip_threshold;
            if threshold > 0 && state.skip_streak(site.skip_accounting) >= threshold {
                break StopReason::SkipThreshold;
            }
            page += 1;
        };

        if matches!(stop, StopReason::FetchFailed | StopReason::NoLinks) && page > 1 {
            state.set_final_page(&site.name, page - 1);
        }
        report.stop = stop;
        info!(
            target: OPERATIONAL,
            severity = %Severity::Info,
            unit = %target,
            pages = report.pages,
            new_links = report.new_links,
            duplicates = report.duplicates,
            reason = %stop,
            "target finished"
        );
        Ok(report)
    }

    /// Filters `links` against the listing scope and resolves detail hops.
    ///
    /// Stops admitting once the artifact limit is reached; the remaining
    /// links stay unrecorded so a later run picks them up.
    async fn admit(
        &self,
        site: &SiteDefinition,
        extractors: &Extractors,
        links: Vec<String>,
        state: &mut RunState,
        report: &mut CrawlReport,
    ) -> Vec<String> {
        let scope = site.listing_scope;
        let mut fresh = Vec::new();

        for link in links {
            if self.limits.artifacts_exhausted(state.found()) {
                break;
            }
            if self.store.exists(scope, &link) {
                state.record_duplicate();
                report.duplicates += 1;
                debug!(link = %link, scope = scope.as_str(), "already seen");
                continue;
            }

            let resolved = match &extractors.detail {
                Some(detail) => match self.follow(site, detail, &link).await {
                    Some(resolved) => resolved,
                    None => continue,
                },
                None => link.clone(),
            };

            self.store.record(scope, &link);
            state.record_found();
            report.new_links += 1;
            fresh.push(resolved);
        }

        fresh
    }

    /// Fetches a detail page and picks the artifact link from it.
    async fn follow(
        &self,
        site: &SiteDefinition,
        detail: &LinkExtractor,
        link: &str,
    ) -> Option<String> {
        let (path, hosts) = relative_to_hosts(link, &site.base_urls);
        let fetched = match self.fetcher.fetch(&path, &hosts).await {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(
                    target: OPERATIONAL,
                    severity = %Severity::Warning,
                    link,
                    error = %e,
                    "detail page unavailable, skipping link"
                );
                return None;
            }
        };

        let picked = detail.pick(&fetched.body, &fetched.url, site.detail_pick);
        if picked.is_none() {
            warn!(
                target: OPERATIONAL,
                severity = %Severity::Warning,
                link,
                "no link on detail page, skipping"
            );
        }
        picked
    }
}

/// Compiled extractors for one site.
///
/// Link filters apply to the final link: the detail page's when the site
/// hops, the listing page's otherwise.
struct Extractors {
    listing: LinkExtractor,
    detail: Option<LinkExtractor>,
}

impl Extractors {
    fn for_site(site: &SiteDefinition) -> Result<Self, ExtractError> {
        let filter = LinkFilter::new(site.link_pattern.as_deref(), &site.link_contains)?;
        let listing = LinkExtractor::new(&site.link_selector)?;
        Ok(match &site.detail_selector {
            Some(selector) => Self {
                listing,
                detail: Some(LinkExtractor::new(selector)?.with_filter(filter)),
            },
            None => Self {
                listing: listing.with_filter(filter),
                detail: None,
            },
        })
    }
}

/// Splits a link on one of the site's hosts into a path plus the host list,
/// so a detail page can be retried on the mirrors.
fn relative_to_hosts(link: &str, bases: &[String]) -> (String, Vec<String>) {
    bases
        .iter()
        .find_map(|base| link.strip_prefix(base.as_str()))
        .map_or_else(
            || (link.to_string(), Vec::new()),
            |path| (path.to_string(), bases.to_vec()),
        )
}
