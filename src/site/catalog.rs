//! Site definitions and the JSON catalog that holds them.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::extract::Pick;
use crate::store::Scope;

/// Errors raised while loading or querying the site catalog.
#[derive(Debug, Error)]
pub enum SiteError {
    /// The catalog file could not be read.
    #[error("cannot read site catalog {path}: {source}")]
    Io {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid JSON for a list of sites.
    #[error("invalid site catalog {path}: {source}")]
    Parse {
        /// Catalog path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A site definition is unusable.
    #[error("invalid site definition '{site}': {message}")]
    Invalid {
        /// Site name.
        site: String,
        /// What is wrong.
        message: String,
    },

    /// A requested site is not in the catalog.
    #[error("unknown site '{name}' (available: {available})")]
    UnknownSite {
        /// Requested name.
        name: String,
        /// Comma-separated catalog names.
        available: String,
    },
}

impl SiteError {
    fn invalid(site: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            site: site.to_string(),
            message: message.into(),
        }
    }
}

/// What happens to a new link once it passes dedup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// The dedup entry is the artifact (magnet lists and the like).
    Record,
    /// Fetch with an external tool such as `yt-dlp`.
    #[default]
    External,
    /// Fetch over HTTP and apply the quality replacement policy.
    Direct,
}

/// Which consecutive-skip counter stops pagination for a site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipAccounting {
    /// Links skipped by the download orchestrator (already downloaded).
    #[default]
    Downloads,
    /// Links already present in the listing dedup scope.
    Duplicates,
    /// Never stop on skips.
    None,
}

/// One crawlable site.
///
/// Loaded from the catalog; every field but `name`, `base_urls` and
/// `link_selector` is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteDefinition {
    /// Display name, matched case-insensitively.
    pub name: String,
    /// Mirror hosts, tried in order.
    pub base_urls: Vec<String>,

    /// Listing template when neither a query nor a category is used.
    #[serde(default)]
    pub index_template: Option<String>,
    /// Index template for page 1 when it differs from the others.
    #[serde(default)]
    pub first_page_template: Option<String>,
    /// Search listing template; uses `{query}`.
    #[serde(default)]
    pub search_template: Option<String>,
    /// Category listing template; uses `{category}`.
    #[serde(default)]
    pub category_template: Option<String>,
    /// Template for categories listed in `special_categories`.
    #[serde(default)]
    pub special_category_template: Option<String>,
    /// Categories served by `special_category_template`.
    #[serde(default)]
    pub special_categories: Vec<String>,
    /// Category name to site-specific code.
    #[serde(default)]
    pub category_codes: BTreeMap<String, String>,

    /// Sort values this site accepts.
    #[serde(default)]
    pub sort_options: Vec<String>,
    /// Date filter values this site accepts.
    #[serde(default)]
    pub date_filter_options: Vec<String>,
    /// Country filter values this site accepts.
    #[serde(default)]
    pub country_filter_options: Vec<String>,
    /// Facet names this site's templates use.
    #[serde(default)]
    pub facets: Vec<String>,
    /// Facet whose value names the library group for direct downloads.
    #[serde(default)]
    pub group_facet: Option<String>,

    /// CSS selector for links on listing pages.
    pub link_selector: String,
    /// Regex every extracted link must match.
    #[serde(default)]
    pub link_pattern: Option<String>,
    /// Case-insensitive substrings; a link must contain one of them.
    #[serde(default)]
    pub link_contains: Vec<String>,
    /// CSS selector applied to each listing link's page.
    #[serde(default)]
    pub detail_selector: Option<String>,
    /// Which detail match to keep.
    #[serde(default)]
    pub detail_pick: Pick,

    /// Page limit for this site; the tighter of this and the run limit applies.
    #[serde(default)]
    pub max_pages: Option<u32>,
    /// How new links are delivered.
    #[serde(default)]
    pub delivery: Delivery,
    /// Which skip counter stops pagination.
    #[serde(default)]
    pub skip_accounting: SkipAccounting,
    /// Dedup scope for listing links.
    #[serde(default = "default_listing_scope")]
    pub listing_scope: Scope,
}

fn default_listing_scope() -> Scope {
    Scope::Scraped
}

impl SiteDefinition {
    fn validate(&self) -> Result<(), SiteError> {
        if self.name.trim().is_empty() {
            return Err(SiteError::invalid("<unnamed>", "name must not be empty"));
        }
        if self.base_urls.is_empty() {
            return Err(SiteError::invalid(&self.name, "base_urls must not be empty"));
        }
        for base in &self.base_urls {
            if url::Url::parse(base).is_err() {
                return Err(SiteError::invalid(&self.name, format!("invalid base URL '{base}'")));
            }
        }
        if self.index_template.is_none()
            && self.search_template.is_none()
            && self.category_template.is_none()
            && self.special_category_template.is_none()
        {
            return Err(SiteError::invalid(&self.name, "no listing template"));
        }
        if self.link_selector.trim().is_empty() {
            return Err(SiteError::invalid(&self.name, "link_selector must not be empty"));
        }
        if let Some(group) = &self.group_facet
            && !self.facets.contains(group)
        {
            return Err(SiteError::invalid(
                &self.name,
                format!("group_facet '{group}' is not one of the site's facets"),
            ));
        }
        Ok(())
    }

    /// The host used for `{base_url}`.
    #[must_use]
    pub fn primary_base(&self) -> &str {
        self.base_urls.first().map_or("", String::as_str)
    }

    /// Site-specific code for `category`, or the category itself.
    #[must_use]
    pub fn category_code<'a>(&'a self, category: &'a str) -> &'a str {
        self.category_codes
            .get(category)
            .map_or(category, String::as_str)
    }

    /// Whether this site supports search listings.
    #[must_use]
    pub fn supports_search(&self) -> bool {
        self.search_template.is_some()
    }

    /// Whether this site supports category listings.
    #[must_use]
    pub fn supports_categories(&self) -> bool {
        self.category_template.is_some() || self.special_category_template.is_some()
    }

    /// Whether this site has an index listing.
    #[must_use]
    pub fn supports_index(&self) -> bool {
        self.index_template.is_some()
    }
}

/// All known sites, in catalog order.
#[derive(Debug, Clone, Default)]
pub struct SiteCatalog {
    sites: Vec<SiteDefinition>,
}

impl SiteCatalog {
    /// Loads and validates a JSON catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError`] if the file is unreadable, not a JSON array of
    /// site definitions, or contains an invalid or duplicate site.
    #[instrument(level = "debug", fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, SiteError> {
        let text = fs::read_to_string(path).map_err(|source| SiteError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let sites: Vec<SiteDefinition> =
            serde_json::from_str(&text).map_err(|source| SiteError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let catalog = Self::from_sites(sites)?;
        debug!(sites = catalog.sites.len(), "site catalog loaded");
        Ok(catalog)
    }

    /// Builds a catalog from already-parsed definitions.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::Invalid`] for an invalid or duplicate site.
    pub fn from_sites(sites: Vec<SiteDefinition>) -> Result<Self, SiteError> {
        let mut names = HashSet::new();
        for site in &sites {
            site.validate()?;
            if !names.insert(site.name.to_lowercase()) {
                return Err(SiteError::invalid(&site.name, "duplicate site name"));
            }
        }
        Ok(Self { sites })
    }

    /// Looks a site up by name, ignoring case.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&SiteDefinition> {
        self.sites.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    /// Resolves requested names to definitions. `all` selects every site.
    ///
    /// # Errors
    ///
    /// Returns [`SiteError::UnknownSite`] for the first name not in the catalog.
    pub fn select(&self, names: &[String]) -> Result<Vec<SiteDefinition>, SiteError> {
        if names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case("all")) {
            return Ok(self.sites.clone());
        }
        names
            .iter()
            .map(|name| {
                self.find(name).cloned().ok_or_else(|| SiteError::UnknownSite {
                    name: name.clone(),
                    available: self.names().join(", "),
                })
            })
            .collect()
    }

    /// Site names in catalog order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
