//! Targets: one site in one listing mode with fixed facet values.

use std::fmt;
use std::sync::Arc;

use url::Url;

use super::catalog::SiteDefinition;
use super::template::{PageTemplate, TemplateError, TemplateFields};

/// Which listing a target walks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetMode {
    /// The site's default listing.
    Index,
    /// Search results for a term.
    Search(String),
    /// A category listing.
    Category(String),
}

impl TargetMode {
    fn label(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Search(_) => "search",
            Self::Category(_) => "category",
        }
    }
}

/// Configured sort and filter values.
///
/// A value is only applied to a site that lists it among its options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filters {
    /// Sort option, e.g. `mv`.
    pub sort: Option<String>,
    /// Date filter, e.g. `w`.
    pub date_filter: Option<String>,
    /// Country filter, e.g. `world`.
    pub country_filter: Option<String>,
}

/// A concrete page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Rendered URL; relative when `hosts` is non-empty.
    pub url: String,
    /// Fallback hosts to join `url` against, in order.
    pub hosts: Vec<String>,
}

/// One pagination unit. Immutable once built.
#[derive(Debug, Clone)]
pub struct Target {
    site: Arc<SiteDefinition>,
    mode: TargetMode,
    facets: Vec<(String, String)>,
}

impl Target {
    /// Creates a target.
    #[must_use]
    pub fn new(site: Arc<SiteDefinition>, mode: TargetMode, facets: Vec<(String, String)>) -> Self {
        Self { site, mode, facets }
    }

    /// The site definition.
    #[must_use]
    pub fn site(&self) -> &SiteDefinition {
        &self.site
    }

    /// The listing mode.
    #[must_use]
    pub fn mode(&self) -> &TargetMode {
        &self.mode
    }

    /// Facet values, in configured order.
    #[must_use]
    pub fn facets(&self) -> &[(String, String)] {
        &self.facets
    }

    /// Query or category, or `None` in index mode.
    #[must_use]
    pub fn tag(&self) -> Option<&str> {
        match &self.mode {
            TargetMode::Index => None,
            TargetMode::Search(term) | TargetMode::Category(term) => Some(term),
        }
    }

    /// Output group: `<tag> - <site>`, or `<site>` in index mode.
    #[must_use]
    pub fn group_name(&self) -> String {
        match self.tag() {
            Some(tag) => format!("{tag} - {}", self.site.name),
            None => self.site.name.clone(),
        }
    }

    /// Library group for direct downloads: the value of the site's
    /// `group_facet` when it has one, else [`group_name`](Self::group_name).
    #[must_use]
    pub fn library_group(&self) -> String {
        self.site
            .group_facet
            .as_ref()
            .and_then(|facet| self.facets.iter().find(|(name, _)| name == facet))
            .map_or_else(|| self.group_name(), |(_, value)| value.clone())
    }

    /// The template used for `page`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::NoTemplate`] if the site lacks a template for
    /// this mode, or [`TemplateError::Malformed`] if it does not parse.
    pub fn template(&self, page: u32) -> Result<PageTemplate, TemplateError> {
        let site = &self.site;
        let raw = match &self.mode {
            TargetMode::Index if page == 1 => site
                .first_page_template
                .as_ref()
                .or(site.index_template.as_ref()),
            TargetMode::Index => site.index_template.as_ref(),
            TargetMode::Search(_) => site.search_template.as_ref(),
            TargetMode::Category(category) => {
                if site.special_categories.iter().any(|c| c == category) {
                    site.special_category_template
                        .as_ref()
                        .or(site.category_template.as_ref())
                } else {
                    site.category_template.as_ref()
                }
            }
        };
        let raw = raw.ok_or_else(|| TemplateError::NoTemplate {
            site: site.name.clone(),
            mode: self.mode.label().to_string(),
        })?;
        PageTemplate::parse(raw)
    }

    /// Builds the request for `page`.
    ///
    /// An absolute rendered URL is fetched as-is; a relative one is joined
    /// against each of the site's hosts in turn.
    ///
    /// # Errors
    ///
    /// Propagates any [`TemplateError`] from selecting or rendering the template.
    pub fn page_request(&self, page: u32, filters: &Filters) -> Result<PageRequest, TemplateError> {
        let site = &self.site;
        fn supported<'v>(value: &'v Option<String>, options: &[String]) -> Option<&'v str> {
            value
                .as_deref()
                .filter(|v| options.iter().any(|o| o == v))
        }

        let category = match &self.mode {
            TargetMode::Category(c) => Some(site.category_code(c)),
            _ => None,
        };
        let query = match &self.mode {
            TargetMode::Search(q) => Some(q.as_str()),
            _ => None,
        };
        let fields = TemplateFields {
            base_url: site.primary_base(),
            page,
            sort: supported(&filters.sort, &site.sort_options),
            date_filter: supported(&filters.date_filter, &site.date_filter_options),
            country_filter: supported(&filters.country_filter, &site.country_filter_options),
            query,
            category,
            facets: &self.facets,
        };

        let url = self.template(page)?.render(&fields)?;
        let hosts = if Url::parse(&url).is_ok() {
            Vec::new()
        } else {
            site.base_urls.clone()
        };
        Ok(PageRequest { url, hosts })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.site.name)?;
        if let Some(tag) = self.tag() {
            write!(f, " [{}: {tag}]", self.mode.label())?;
        }
        for (name, value) in &self.facets {
            write!(f, " {name}={value}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn site(json: &str) -> Arc<SiteDefinition> {
        Arc::new(serde_json::from_str(json).unwrap())
    }

    fn relative_site() -> Arc<SiteDefinition> {
        site(
            r#"{
                "name": "Movies",
                "base_urls": ["https://a.example/", "https://b.example/"],
                "first_page_template": "browse/{resolution}",
                "index_template": "browse/{resolution}?page={page}",
                "facets": ["resolution"],
                "link_selector": "a"
            }"#,
        )
    }

    fn absolute_site() -> Arc<SiteDefinition> {
        site(
            r#"{
                "name": "Tube",
                "base_urls": ["https://tube.example/"],
                "search_template": "{base_url}search?q={query}&o={sort}&page={page}",
                "category_template": "{base_url}c/{category}?page={page}",
                "special_category_template": "{base_url}{category}/videos?page={page}",
                "special_categories": ["gay"],
                "category_codes": {"music": "10"},
                "sort_options": ["mv"],
                "link_selector": "a"
            }"#,
        )
    }

    #[test]
    fn test_relative_template_uses_host_fallback() {
        let facets = vec![("resolution".to_string(), "1080p".to_string())];
        let target = Target::new(relative_site(), TargetMode::Index, facets);

        let first = target.page_request(1, &Filters::default()).unwrap();
        assert_eq!(first.url, "browse/1080p");
        assert_eq!(first.hosts, vec!["https://a.example/", "https://b.example/"]);

        let second = target.page_request(2, &Filters::default()).unwrap();
        assert_eq!(second.url, "browse/1080p?page=2");
    }

    #[test]
    fn test_absolute_template_has_no_hosts() {
        let target = Target::new(absolute_site(), TargetMode::Search("cat videos".into()), vec![]);
        let filters = Filters {
            sort: Some("mv".into()),
            ..Filters::default()
        };
        let request = target.page_request(1, &filters).unwrap();
        assert_eq!(request.url, "https://tube.example/search?q=cat+videos&o=mv&page=1");
        assert!(request.hosts.is_empty());
    }

    #[test]
    fn test_unsupported_sort_is_dropped() {
        let target = Target::new(absolute_site(), TargetMode::Search("x".into()), vec![]);
        let filters = Filters {
            sort: Some("longest".into()),
            ..Filters::default()
        };
        let request = target.page_request(3, &filters).unwrap();
        assert_eq!(request.url, "https://tube.example/search?q=x&o=&page=3");
    }

    #[test]
    fn test_category_codes_and_special_categories() {
        let music = Target::new(absolute_site(), TargetMode::Category("music".into()), vec![]);
        assert_eq!(
            music.page_request(1, &Filters::default()).unwrap().url,
            "https://tube.example/c/10?page=1"
        );

        let special = Target::new(absolute_site(), TargetMode::Category("gay".into()), vec![]);
        assert_eq!(
            special.page_request(2, &Filters::default()).unwrap().url,
            "https://tube.example/gay/videos?page=2"
        );
    }

    #[test]
    fn test_missing_mode_template_is_error() {
        let target = Target::new(absolute_site(), TargetMode::Index, vec![]);
        let err = target.page_request(1, &Filters::default()).unwrap_err();
        assert!(matches!(err, TemplateError::NoTemplate { .. }));
    }

    #[test]
    fn test_group_name_and_display() {
        let search = Target::new(absolute_site(), TargetMode::Search("cats".into()), vec![]);
        assert_eq!(search.group_name(), "cats - Tube");
        assert_eq!(search.to_string(), "Tube [search: cats]");

        let facets = vec![("resolution".to_string(), "720p".to_string())];
        let index = Target::new(relative_site(), TargetMode::Index, facets);
        assert_eq!(index.group_name(), "Movies");
        assert_eq!(index.to_string(), "Movies resolution=720p");
    }

    #[test]
    fn test_library_group_uses_group_facet() {
        let grouped = site(
            r#"{
                "name": "Movies",
                "base_urls": ["https://a.example/"],
                "index_template": "browse/{language}/{page}",
                "facets": ["language"],
                "group_facet": "language",
                "link_selector": "a"
            }"#,
        );
        let facets = vec![("language".to_string(), "English".to_string())];
        let target = Target::new(grouped, TargetMode::Index, facets);
        assert_eq!(target.library_group(), "English");

        let plain = Target::new(absolute_site(), TargetMode::Search("cats".into()), vec![]);
        assert_eq!(plain.library_group(), "cats - Tube");
    }
}
