//! Link extraction from listing and detail pages.
//!
//! A [`LinkExtractor`] applies a CSS selector to an HTML document and
//! returns the `href` (or `src`) of every matching element, resolved to an
//! absolute URL against the page it came from. Inert placeholders such as
//! `#` and `javascript:void(0)` are dropped and repeated links keep only
//! their first position.
//!
//! An empty result is not an error: the pagination driver treats it as the
//! end of the listing.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Errors raised while building an extractor.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The CSS selector does not parse.
    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// The link filter regex does not compile.
    #[error("invalid link pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Regex compilation error.
        #[source]
        source: regex::Error,
    },
}

impl ExtractError {
    /// Creates an invalid selector error.
    pub fn invalid_selector(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidSelector {
            selector: selector.into(),
            message: message.into(),
        }
    }
}

/// Which link to keep when a detail page yields several.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pick {
    /// The first match in document order.
    #[default]
    First,
    /// The last match in document order.
    Last,
}

/// Post-resolution filter on extracted links.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pattern: Option<Regex>,
    contains_any: Vec<String>,
}

impl LinkFilter {
    /// Builds a filter from an optional regex and case-insensitive substrings.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidPattern`] if `pattern` does not compile.
    pub fn new(pattern: Option<&str>, contains_any: &[String]) -> Result<Self, ExtractError> {
        let pattern = pattern
            .map(|p| {
                Regex::new(p).map_err(|source| ExtractError::InvalidPattern {
                    pattern: p.to_string(),
                    source,
                })
            })
            .transpose()?;
        Ok(Self {
            pattern,
            contains_any: contains_any.iter().map(|s| s.to_lowercase()).collect(),
        })
    }

    /// Whether `link` passes the filter.
    #[must_use]
    pub fn accepts(&self, link: &str) -> bool {
        if let Some(pattern) = &self.pattern
            && !pattern.is_match(link)
        {
            return false;
        }
        if self.contains_any.is_empty() {
            return true;
        }
        let lower = link.to_lowercase();
        self.contains_any.iter().any(|needle| lower.contains(needle))
    }
}

/// Extracts absolute links matching a CSS selector.
#[derive(Debug, Clone)]
pub struct LinkExtractor {
    selector: Selector,
    filter: LinkFilter,
}

impl LinkExtractor {
    /// Compiles `selector`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::InvalidSelector`] if the selector does not parse.
    pub fn new(selector: &str) -> Result<Self, ExtractError> {
        let compiled = Selector::parse(selector)
            .map_err(|e| ExtractError::invalid_selector(selector, e.to_string()))?;
        Ok(Self {
            selector: compiled,
            filter: LinkFilter::default(),
        })
    }

    /// Attaches a post-resolution filter.
    #[must_use]
    pub fn with_filter(mut self, filter: LinkFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Returns every matching link on the page, in document order, once each.
    ///
    /// `page_url` is the final URL the page was served from; relative links
    /// resolve against it.
    #[must_use]
    pub fn extract(&self, html: &str, page_url: &str) -> Vec<String> {
        let base = Url::parse(page_url).ok();
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut links = Vec::new();

        for element in document.select(&self.selector) {
            let value = element.value();
            let Some(raw) = value.attr("href").or_else(|| value.attr("src")) else {
                continue;
            };
            let raw = raw.trim();
            if is_inert(raw) {
                continue;
            }
            let Some(link) = resolve(raw, base.as_ref()) else {
                debug!(link = raw, page_url, "dropping unresolvable link");
                continue;
            };
            if !self.filter.accepts(&link) {
                continue;
            }
            if seen.insert(link.clone()) {
                links.push(link);
            }
        }

        links
    }

    /// Returns the first or last matching link on the page.
    #[must_use]
    pub fn pick(&self, html: &str, page_url: &str, pick: Pick) -> Option<String> {
        let mut links = self.extract(html, page_url);
        match pick {
            Pick::First => links.into_iter().next(),
            Pick::Last => links.pop(),
        }
    }
}

/// Placeholders that point nowhere.
fn is_inert(href: &str) -> bool {
    href.is_empty() || href.starts_with('#') || href.to_ascii_lowercase().starts_with("javascript:")
}

/// Absolute links pass through untouched; anything else is joined to `base`.
fn resolve(href: &str, base: Option<&Url>) -> Option<String> {
    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }
    base?.join(href).ok().map(String::from)
}
