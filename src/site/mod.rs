//! Site catalog, crawl targets and page URL templates.
//!
//! A [`SiteCatalog`] is loaded from a JSON array of [`SiteDefinition`]s. The
//! run expands each selected site into one or more [`Target`]s, and each
//! target renders a [`PageRequest`] per page through its [`PageTemplate`].

mod catalog;
mod target;
mod template;

pub use catalog::{Delivery, SiteCatalog, SiteDefinition, SiteError, SkipAccounting};
pub use target::{Filters, PageRequest, Target, TargetMode};
pub use template::{PageTemplate, TemplateError, TemplateFields};
