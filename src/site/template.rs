//! Page URL templates.
//!
//! Templates use `{field}` placeholders with `{{` and `}}` as literal braces:
//!
//! ```
//! use mediacrawl_core::site::{PageTemplate, TemplateFields};
//!
//! let template = PageTemplate::parse("{base_url}search?q={query}&page={page}").unwrap();
//! let fields = TemplateFields {
//!     base_url: "https://site.example/",
//!     page: 2,
//!     query: Some("big buck bunny"),
//!     ..TemplateFields::default()
//! };
//! assert_eq!(
//!     template.render(&fields).unwrap(),
//!     "https://site.example/search?q=big+buck+bunny&page=2"
//! );
//! ```

use thiserror::Error;

/// Errors raised while parsing or rendering a template.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// Unbalanced or empty braces.
    #[error("malformed template '{template}': {message}")]
    Malformed {
        /// The template text.
        template: String,
        /// What is wrong with it.
        message: String,
    },

    /// A placeholder names a field nothing supplies.
    #[error("template '{template}' uses unknown field '{{{field}}}'")]
    UnknownField {
        /// The template text.
        template: String,
        /// The unknown field.
        field: String,
    },

    /// A required field has no value for this target.
    #[error("template '{template}' needs a value for '{{{field}}}'")]
    MissingValue {
        /// The template text.
        template: String,
        /// The field without a value.
        field: String,
    },

    /// The site has no template for the requested mode.
    #[error("site '{site}' has no {mode} template")]
    NoTemplate {
        /// Site name.
        site: String,
        /// The mode without a template.
        mode: String,
    },
}

/// Values available to a template.
///
/// Optional filters render as an empty string when absent; `query` and
/// `category` are required whenever the template mentions them.
#[derive(Debug, Clone, Default)]
pub struct TemplateFields<'a> {
    /// Base host of the site (first entry of its host list).
    pub base_url: &'a str,
    /// 1-indexed page number.
    pub page: u32,
    /// Sort option, if the site supports the configured one.
    pub sort: Option<&'a str>,
    /// Date filter, if the site supports the configured one.
    pub date_filter: Option<&'a str>,
    /// Country filter, if the site supports the configured one.
    pub country_filter: Option<&'a str>,
    /// Search term.
    pub query: Option<&'a str>,
    /// Category code.
    pub category: Option<&'a str>,
    /// Facet values such as `resolution = 1080p`.
    pub facets: &'a [(String, String)],
}

impl TemplateFields<'_> {
    fn lookup(&self, template: &str, field: &str) -> Result<String, TemplateError> {
        let missing = || TemplateError::MissingValue {
            template: template.to_string(),
            field: field.to_string(),
        };
        let value = match field {
            "base_url" => self.base_url.to_string(),
            "page" => self.page.to_string(),
            "sort" => self.sort.unwrap_or_default().to_string(),
            "date_filter" => self.date_filter.unwrap_or_default().to_string(),
            "country_filter" => self.country_filter.unwrap_or_default().to_string(),
            "query" => self.query.ok_or_else(missing)?.to_string(),
            "category" => self.category.ok_or_else(missing)?.to_string(),
            other => self
                .facets
                .iter()
                .find(|(name, _)| name == other)
                .map(|(_, value)| value.clone())
                .ok_or_else(|| TemplateError::UnknownField {
                    template: template.to_string(),
                    field: other.to_string(),
                })?,
        };
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(String),
}

/// A parsed page URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl PageTemplate {
    /// Parses `raw`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Malformed`] on unbalanced or empty braces.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        let malformed = |message: &str| TemplateError::Malformed {
            template: raw.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = raw.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some('{') | None => return Err(malformed("unclosed '{'")),
                            Some(ch) => name.push(ch),
                        }
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(malformed("empty placeholder"));
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                '}' => return Err(malformed("unmatched '}'")),
                other => literal.push(other),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    /// The template text as written.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Names of every placeholder, in order.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Whether the template mentions `{page}`.
    #[must_use]
    pub fn is_paginated(&self) -> bool {
        self.fields().any(|f| f == "page")
    }

    /// Renders the template. Spaces in the result become `+`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::UnknownField`] or
    /// [`TemplateError::MissingValue`] when a placeholder cannot be filled.
    pub fn render(&self, fields: &TemplateFields<'_>) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.raw.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(name) => out.push_str(&fields.lookup(&self.raw, name)?),
            }
        }
        Ok(out.replace(' ', "+"))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn base() -> TemplateFields<'static> {
        TemplateFields {
            base_url: "https://site.example/",
            page: 1,
            ..TemplateFields::default()
        }
    }

    #[test]
    fn test_parse_rejects_unbalanced_braces() {
        assert!(matches!(
            PageTemplate::parse("{base_url}page/{page"),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            PageTemplate::parse("page}"),
            Err(TemplateError::Malformed { .. })
        ));
        assert!(matches!(
            PageTemplate::parse("x/{}"),
            Err(TemplateError::Malformed { .. })
        ));
    }

    #[test]
    fn test_render_escaped_braces() {
        let template = PageTemplate::parse("{{literal}}/{page}").unwrap();
        let fields = TemplateFields { page: 4, ..base() };
        assert_eq!(template.render(&fields).unwrap(), "{literal}/4");
    }

    #[test]
    fn test_render_absent_filters_are_empty() {
        let template = PageTemplate::parse("{base_url}videos?o={sort}&t={date_filter}&cc={country_filter}&page={page}").unwrap();
        let rendered = template.render(&base()).unwrap();
        assert_eq!(rendered, "https://site.example/videos?o=&t=&cc=&page=1");
    }

    #[test]
    fn test_render_missing_query_is_error() {
        let template = PageTemplate::parse("search/{query}/{page}").unwrap();
        let err = template.render(&base()).unwrap_err();
        assert!(matches!(err, TemplateError::MissingValue { ref field, .. } if field == "query"));
    }

    #[test]
    fn test_render_unknown_field_is_error() {
        let template = PageTemplate::parse("browse/{genre}/{page}").unwrap();
        let err = template.render(&base()).unwrap_err();
        assert!(matches!(err, TemplateError::UnknownField { ref field, .. } if field == "genre"));
    }

    #[test]
    fn test_render_facets() {
        let facets = vec![
            ("resolution".to_string(), "1080p".to_string()),
            ("genre".to_string(), "all".to_string()),
        ];
        let template = PageTemplate::parse("browse-movies/0/{resolution}/{genre}?page={page}").unwrap();
        let fields = TemplateFields {
            page: 3,
            facets: &facets,
            ..base()
        };
        assert_eq!(
            template.render(&fields).unwrap(),
            "browse-movies/0/1080p/all?page=3"
        );
    }

    #[test]
    fn test_is_paginated() {
        assert!(PageTemplate::parse("a?page={page}").unwrap().is_paginated());
        assert!(!PageTemplate::parse("{base_url}top").unwrap().is_paginated());
    }
}
