//! Configuration file loading and resolved run settings.
//!
//! The file is flat `key = value` lines with `#` comments. Values are
//! double-quoted strings, non-negative integers, `true`/`false`, or string
//! arrays like `["a", "b"]`. Facet enumerations use `facet.<name> = [...]`
//! and keep their file order.
//!
//! Command-line values are turned into a [`FileConfig`] of their own and
//! layered on top with [`FileConfig::layered_over`]; [`RunSettings::resolve`]
//! then fills in defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::crawl::{CrawlLimits, DEFAULT_MAX_ARTIFACTS, DEFAULT_PAGE_DELAY, DEFAULT_SKIP_THRESHOLD};
use crate::download::{DEFAULT_DOWNLOAD_ATTEMPTS, DEFAULT_DOWNLOAD_DELAY};
use crate::fetch::{
    Backoff, CONNECT_TIMEOUT_SECS, ClientSettings, DEFAULT_FETCH_ROUNDS, DEFAULT_ROUND_DELAY,
    READ_TIMEOUT_SECS, RetryPolicy,
};
use crate::site::Filters;
use crate::store::{DedupStore, Scope};
use crate::user_agent;

/// Directory name under the user's config directory.
const APP_DIR: &str = "mediacrawl";

/// Default run budget in minutes.
pub const DEFAULT_MAX_DURATION_MINUTES: u64 = 720;

/// Errors from reading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        /// Config path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A line is not `key = value`.
    #[error("invalid config syntax on line {line}: expected key = value")]
    Syntax {
        /// 1-based line number.
        line: usize,
    },

    /// The key is not recognised.
    #[error("unknown configuration key '{key}' on line {line}")]
    UnknownKey {
        /// Offending key.
        key: String,
        /// 1-based line number.
        line: usize,
    },

    /// The value does not parse or is out of range.
    #[error("invalid `{key}` value{}: {message}", .line.map(|l| format!(" on line {l}")).unwrap_or_default())]
    InvalidValue {
        /// Key being set.
        key: String,
        /// 1-based line number, when the value came from a file.
        line: Option<usize>,
        /// What was wrong.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            line: Some(line),
            message: message.into(),
        }
    }

    fn out_of_range(key: &str, value: u64, range: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            line: None,
            message: format!("{value} outside {range}"),
        }
    }
}

/// Verbosity labels accepted in the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VerbositySetting {
    /// Info and above.
    #[default]
    Default,
    /// Debug for this crate.
    Verbose,
    /// Warnings and errors only.
    Quiet,
    /// Debug everywhere.
    Debug,
}

impl VerbositySetting {
    /// Stable label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Verbose => "verbose",
            Self::Quiet => "quiet",
            Self::Debug => "debug",
        }
    }

    fn parse(value: &str) -> Result<Self, String> {
        match value {
            "default" => Ok(Self::Default),
            "verbose" => Ok(Self::Verbose),
            "quiet" => Ok(Self::Quiet),
            "debug" => Ok(Self::Debug),
            _ => Err("expected one of: default, verbose, quiet, debug".to_string()),
        }
    }
}

/// Every setting that may appear in the file. `None` means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileConfig {
    /// Site catalog (JSON).
    pub sites_file: Option<PathBuf>,
    /// Site names to crawl; empty or `all` selects every site.
    pub sites: Option<Vec<String>>,
    /// Search queries.
    pub queries: Option<Vec<String>>,
    /// Categories.
    pub categories: Option<Vec<String>>,
    /// Crawl each site's index listing too.
    pub use_index_page: Option<bool>,
    /// Directory holding the dedup files.
    pub state_dir: Option<PathBuf>,
    /// Root for external-tool downloads.
    pub download_dir: Option<PathBuf>,
    /// Root for direct downloads.
    pub library_dir: Option<PathBuf>,
    /// Optional second copy of direct downloads.
    pub mirror_dir: Option<PathBuf>,
    /// Override for the scraped-links file.
    pub scraped_file: Option<PathBuf>,
    /// Override for the downloaded-links file.
    pub downloaded_file: Option<PathBuf>,
    /// Override for the magnets file.
    pub magnet_file: Option<PathBuf>,
    /// Pages per target; 0 is unlimited.
    pub max_pages: Option<u32>,
    /// New links per run; 0 is unlimited.
    pub max_artifacts: Option<u64>,
    /// Run budget; 0 is unlimited.
    pub max_duration_minutes: Option<u64>,
    /// Consecutive skips before abandoning a target; 0 disables.
    pub skip_threshold: Option<u32>,
    /// Fetch rounds per page.
    pub fetch_retries: Option<u32>,
    /// Delay between fetch rounds.
    pub fetch_delay_secs: Option<u64>,
    /// When set, the fetch delay doubles each round up to this many seconds.
    pub fetch_backoff_max_secs: Option<u64>,
    /// Delay between listing pages.
    pub page_delay_secs: Option<u64>,
    /// Download attempts per link.
    pub download_retries: Option<u32>,
    /// Delay between download attempts.
    pub download_delay_secs: Option<u64>,
    /// HTTP connect timeout.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP request timeout.
    pub read_timeout_secs: Option<u64>,
    /// User-Agent header.
    pub user_agent: Option<String>,
    /// External downloader program.
    pub downloader: Option<PathBuf>,
    /// ffmpeg location passed to the downloader.
    pub ffmpeg: Option<PathBuf>,
    /// Sort option for listings.
    pub sort_option: Option<String>,
    /// Date filter for listings.
    pub date_filter: Option<String>,
    /// Country filter for listings.
    pub country_filter: Option<String>,
    /// Randomise site order.
    pub shuffle_sites: Option<bool>,
    /// Facets whose value order is randomised.
    pub shuffle: Option<Vec<String>>,
    /// Facet enumerations, in file order.
    pub facets: Vec<(String, Vec<String>)>,
    /// Console verbosity.
    pub verbosity: Option<VerbositySetting>,
    /// Directory for log files.
    pub log_dir: Option<PathBuf>,
    /// Prefix for log file names.
    pub log_prefix: Option<String>,
}

macro_rules! layer {
    ($top:ident, $base:ident; $($field:ident),* $(,)?) => {
        FileConfig {
            $($field: $top.$field.or($base.$field),)*
            facets: merge_facets($top.facets, $base.facets),
        }
    };
}

impl FileConfig {
    /// Parses config text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first bad line.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        for (index, raw_line) in raw.lines().enumerate() {
            let line_no = index + 1;
            let line = strip_inline_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }
            let Some((raw_key, raw_value)) = line.split_once('=') else {
                return Err(ConfigError::Syntax { line: line_no });
            };
            cfg.set(raw_key.trim(), raw_value.trim(), line_no)?;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads and parses `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or any parse error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw)
    }

    fn set(&mut self, key: &str, value: &str, line: usize) -> Result<(), ConfigError> {
        let err = |message: String| ConfigError::invalid(key, line, message);
        let string = || parse_string_literal(value).map_err(err);
        let path = || string().map(PathBuf::from);
        let list = || parse_string_array(value).map_err(err);
        let boolean = || parse_boolean(value).map_err(err);
        let int = || parse_integer_u64(value).map_err(err);
        let int32 = || {
            int().and_then(|v| u32::try_from(v).map_err(|_| err("out of range for u32".to_string())))
        };

        if let Some(name) = key.strip_prefix("facet.") {
            if name.is_empty() {
                return Err(err("facet name must not be empty".to_string()));
            }
            let values = list()?;
            match self.facets.iter_mut().find(|(n, _)| n == name) {
                Some((_, existing)) => *existing = values,
                None => self.facets.push((name.to_string(), values)),
            }
            return Ok(());
        }

        match key {
            "sites_file" => self.sites_file = Some(path()?),
            "sites" => self.sites = Some(list()?),
            "queries" => self.queries = Some(list()?),
            "categories" => self.categories = Some(list()?),
            "use_index_page" => self.use_index_page = Some(boolean()?),
            "state_dir" => self.state_dir = Some(path()?),
            "download_dir" => self.download_dir = Some(path()?),
            "library_dir" => self.library_dir = Some(path()?),
            "mirror_dir" => self.mirror_dir = Some(path()?),
            "scraped_file" => self.scraped_file = Some(path()?),
            "downloaded_file" => self.downloaded_file = Some(path()?),
            "magnet_file" => self.magnet_file = Some(path()?),
            "max_pages" => self.max_pages = Some(int32()?),
            "max_artifacts" => self.max_artifacts = Some(int()?),
            "max_duration_minutes" => self.max_duration_minutes = Some(int()?),
            "skip_threshold" => self.skip_threshold = Some(int32()?),
            "fetch_retries" => self.fetch_retries = Some(int32()?),
            "fetch_delay_secs" => self.fetch_delay_secs = Some(int()?),
            "fetch_backoff_max_secs" => self.fetch_backoff_max_secs = Some(int()?),
            "page_delay_secs" => self.page_delay_secs = Some(int()?),
            "download_retries" => self.download_retries = Some(int32()?),
            "download_delay_secs" => self.download_delay_secs = Some(int()?),
            "connect_timeout_secs" => self.connect_timeout_secs = Some(int()?),
            "read_timeout_secs" => self.read_timeout_secs = Some(int()?),
            "user_agent" => self.user_agent = Some(string()?),
            "downloader" => self.downloader = Some(path()?),
            "ffmpeg" => self.ffmpeg = Some(path()?),
            "sort_option" => self.sort_option = Some(string()?),
            "date_filter" => self.date_filter = Some(string()?),
            "country_filter" => self.country_filter = Some(string()?),
            "shuffle_sites" => self.shuffle_sites = Some(boolean()?),
            "shuffle" => self.shuffle = Some(list()?),
            "verbosity" => {
                let label = string()?;
                self.verbosity = Some(VerbositySetting::parse(&label).map_err(err)?);
            }
            "log_dir" => self.log_dir = Some(path()?),
            "log_prefix" => self.log_prefix = Some(string()?),
            unknown => {
                return Err(ConfigError::UnknownKey {
                    key: unknown.to_string(),
                    line,
                });
            }
        }
        Ok(())
    }

    /// Checks numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for the first value out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("fetch_retries", self.fetch_retries.map(u64::from), 1, 100)?;
        check_range("download_retries", self.download_retries.map(u64::from), 1, 100)?;
        check_range("fetch_delay_secs", self.fetch_delay_secs, 0, 3600)?;
        check_range("fetch_backoff_max_secs", self.fetch_backoff_max_secs, 1, 3600)?;
        check_range("page_delay_secs", self.page_delay_secs, 0, 3600)?;
        check_range("download_delay_secs", self.download_delay_secs, 0, 3600)?;
        check_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        check_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        check_range(
            "max_duration_minutes",
            self.max_duration_minutes,
            0,
            MAX_DURATION_MINUTES_LIMIT,
        )?;
        Ok(())
    }

    /// Returns `self` with every unset field taken from `base`.
    ///
    /// Facets set in `self` replace the same-named facet in `base`.
    #[must_use]
    pub fn layered_over(self, base: FileConfig) -> FileConfig {
        let top = self;
        layer!(top, base;
            sites_file, sites, queries, categories, use_index_page, state_dir,
            download_dir, library_dir, mirror_dir, scraped_file, downloaded_file,
            magnet_file, max_pages, max_artifacts, max_duration_minutes,
            skip_threshold, fetch_retries, fetch_delay_secs, fetch_backoff_max_secs,
            page_delay_secs,
            download_retries, download_delay_secs, connect_timeout_secs,
            read_timeout_secs, user_agent, downloader, ffmpeg, sort_option,
            date_filter, country_filter, shuffle_sites, shuffle, verbosity,
            log_dir, log_prefix,
        )
    }
}

fn merge_facets(
    top: Vec<(String, Vec<String>)>,
    base: Vec<(String, Vec<String>)>,
) -> Vec<(String, Vec<String>)> {
    let mut merged: Vec<(String, Vec<String>)> = base
        .into_iter()
        .filter(|(name, _)| !top.iter().any(|(n, _)| n == name))
        .collect();
    merged.extend(top);
    merged
}

/// One year of run time.
const MAX_DURATION_MINUTES_LIMIT: u64 = 366 * 24 * 60;

fn check_range(key: &str, value: Option<u64>, min: u64, max: u64) -> Result<(), ConfigError> {
    match value {
        Some(v) if !(min..=max).contains(&v) => {
            Err(ConfigError::out_of_range(key, v, &format!("{min}..={max}")))
        }
        _ => Ok(()),
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Site catalog path.
    pub sites_file: PathBuf,
    /// Selected site names; empty selects every site.
    pub sites: Vec<String>,
    /// Search queries.
    pub queries: Vec<String>,
    /// Categories.
    pub categories: Vec<String>,
    /// Crawl index listings.
    pub use_index_page: bool,
    /// Directory holding the dedup files.
    pub state_dir: PathBuf,
    /// Per-scope file overrides.
    pub store_files: Vec<(Scope, PathBuf)>,
    /// Root for external-tool downloads.
    pub download_dir: PathBuf,
    /// Root for direct downloads.
    pub library_dir: PathBuf,
    /// Optional mirror root for direct downloads.
    pub mirror_dir: Option<PathBuf>,
    /// Pagination stop conditions.
    pub limits: CrawlLimits,
    /// Run budget.
    pub budget: Option<Duration>,
    /// Page fetch rounds and delay.
    pub fetch_policy: RetryPolicy,
    /// Download attempts per link.
    pub download_attempts: u32,
    /// Delay between download attempts.
    pub download_delay: Duration,
    /// HTTP client settings.
    pub client: ClientSettings,
    /// External downloader program.
    pub downloader: PathBuf,
    /// ffmpeg location.
    pub ffmpeg: Option<PathBuf>,
    /// Listing filters.
    pub filters: Filters,
    /// Facet enumerations.
    pub facets: Vec<(String, Vec<String>)>,
    /// Facets whose order is randomised.
    pub shuffle: Vec<String>,
    /// Randomise site order.
    pub shuffle_sites: bool,
    /// Console verbosity.
    pub verbosity: VerbositySetting,
    /// Directory for log files.
    pub log_dir: Option<PathBuf>,
    /// Prefix for log file names.
    pub log_prefix: String,
}

impl RunSettings {
    /// Applies defaults to `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if a value is out of range or
    /// `shuffle` names a facet that is not configured.
    pub fn resolve(cfg: FileConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let facets = cfg.facets;
        let shuffle = cfg.shuffle.unwrap_or_default();
        if let Some(unknown) = shuffle
            .iter()
            .find(|name| !facets.iter().any(|(n, _)| n == *name))
        {
            return Err(ConfigError::InvalidValue {
                key: "shuffle".to_string(),
                line: None,
                message: format!("no facet named '{unknown}'"),
            });
        }

        let store_files = [
            (Scope::Scraped, cfg.scraped_file),
            (Scope::Downloaded, cfg.downloaded_file),
            (Scope::Magnets, cfg.magnet_file),
        ]
        .into_iter()
        .filter_map(|(scope, path)| path.map(|p| (scope, p)))
        .collect();

        let budget_minutes = cfg.max_duration_minutes.unwrap_or(DEFAULT_MAX_DURATION_MINUTES);
        let mut fetch_policy = RetryPolicy::new(
            cfg.fetch_retries.unwrap_or(DEFAULT_FETCH_ROUNDS),
            cfg.fetch_delay_secs
                .map_or(DEFAULT_ROUND_DELAY, Duration::from_secs),
        );
        if let Some(max) = cfg.fetch_backoff_max_secs {
            fetch_policy = fetch_policy.with_backoff(Backoff {
                multiplier: 2.0,
                max_delay: Duration::from_secs(max),
            });
        }
        let sites = cfg
            .sites
            .unwrap_or_default()
            .into_iter()
            .filter(|s| !s.trim().is_empty())
            .collect();

        Ok(Self {
            sites_file: cfg
                .sites_file
                .or_else(default_sites_path)
                .unwrap_or_else(|| PathBuf::from("sites.json")),
            sites,
            queries: cfg.queries.unwrap_or_default(),
            categories: cfg.categories.unwrap_or_default(),
            use_index_page: cfg.use_index_page.unwrap_or(false),
            state_dir: cfg.state_dir.unwrap_or_else(|| PathBuf::from(".")),
            store_files,
            download_dir: cfg.download_dir.unwrap_or_else(|| PathBuf::from("downloads")),
            library_dir: cfg.library_dir.unwrap_or_else(|| PathBuf::from("library")),
            mirror_dir: cfg.mirror_dir,
            limits: CrawlLimits {
                max_pages: cfg.max_pages.unwrap_or(0),
                max_artifacts: cfg.max_artifacts.unwrap_or(DEFAULT_MAX_ARTIFACTS),
                skip_threshold: cfg.skip_threshold.unwrap_or(DEFAULT_SKIP_THRESHOLD),
                page_delay: cfg
                    .page_delay_secs
                    .map_or(DEFAULT_PAGE_DELAY, Duration::from_secs),
            },
            budget: (budget_minutes > 0).then(|| Duration::from_secs(budget_minutes.saturating_mul(60))),
            fetch_policy,
            download_attempts: cfg.download_retries.unwrap_or(DEFAULT_DOWNLOAD_ATTEMPTS),
            download_delay: cfg
                .download_delay_secs
                .map_or(DEFAULT_DOWNLOAD_DELAY, Duration::from_secs),
            client: ClientSettings {
                connect_timeout: Duration::from_secs(
                    cfg.connect_timeout_secs.unwrap_or(CONNECT_TIMEOUT_SECS),
                ),
                read_timeout: Duration::from_secs(cfg.read_timeout_secs.unwrap_or(READ_TIMEOUT_SECS)),
                user_agent: cfg
                    .user_agent
                    .unwrap_or_else(|| user_agent::default_browser_user_agent().to_string()),
            },
            downloader: cfg.downloader.unwrap_or_else(|| PathBuf::from("yt-dlp")),
            ffmpeg: cfg.ffmpeg,
            filters: Filters {
                sort: cfg.sort_option,
                date_filter: cfg.date_filter,
                country_filter: cfg.country_filter,
            },
            facets,
            shuffle,
            shuffle_sites: cfg.shuffle_sites.unwrap_or(false),
            verbosity: cfg.verbosity.unwrap_or_default(),
            log_dir: cfg.log_dir,
            log_prefix: cfg.log_prefix.unwrap_or_default(),
        })
    }

    /// The dedup store under `state_dir` with any per-scope overrides.
    #[must_use]
    pub fn dedup_store(&self) -> DedupStore {
        self.store_files
            .iter()
            .fold(DedupStore::new(&self.state_dir), |store, (scope, path)| {
                store.with_file(*scope, path)
            })
    }
}

/// Default config file location.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/mediacrawl/config.toml`
/// 2. `$HOME/.config/mediacrawl/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

fn default_sites_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("sites.json"))
}

fn config_dir() -> Option<PathBuf> {
    if let Some(xdg) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg).join(APP_DIR));
    }
    let home = env_var_non_empty_os("HOME")?;
    Some(PathBuf::from(home).join(".config").join(APP_DIR))
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit`, or the default file when present.
///
/// An explicit path must exist; a missing default file yields an empty
/// config.
///
/// # Errors
///
/// Propagates read and parse errors.
pub fn load_config(explicit: Option<&Path>) -> Result<(Option<PathBuf>, FileConfig), ConfigError> {
    if let Some(path) = explicit {
        return Ok((Some(path.to_path_buf()), FileConfig::load(path)?));
    }
    match resolve_default_config_path() {
        Some(path) if path.exists() => {
            let cfg = FileConfig::load(&path)?;
            Ok((Some(path), cfg))
        }
        _ => Ok((None, FileConfig::default())),
    }
}

fn strip_inline_comment(line: &str) -> &str {
    let mut in_string = false;
    for (index, ch) in line.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            '#' if !in_string => return &line[..index],
            _ => {}
        }
    }
    line
}

fn parse_string_literal(raw: &str) -> Result<String, String> {
    let raw = raw.trim();
    if raw.len() < 2 || !raw.starts_with('"') || !raw.ends_with('"') {
        return Err("expected double-quoted string".to_string());
    }
    Ok(raw[1..raw.len() - 1].to_string())
}

fn parse_string_array(raw: &str) -> Result<Vec<String>, String> {
    let raw = raw.trim();
    let Some(inner) = raw.strip_prefix('[').and_then(|r| r.strip_suffix(']')) else {
        return Err("expected array like [\"a\", \"b\"]".to_string());
    };

    let mut items = Vec::new();
    let mut in_string = false;
    let mut start = 0;
    for (index, ch) in inner.char_indices() {
        match ch {
            '"' => in_string = !in_string,
            ',' if !in_string => {
                items.push(parse_string_literal(&inner[start..index])?);
                start = index + 1;
            }
            _ => {}
        }
    }
    if in_string {
        return Err("unterminated string in array".to_string());
    }
    let tail = inner[start..].trim();
    if !tail.is_empty() {
        items.push(parse_string_literal(tail)?);
    }
    Ok(items)
}

fn parse_integer_u64(raw: &str) -> Result<u64, String> {
    let token = raw.trim();
    if token.is_empty() {
        return Err("expected integer value".to_string());
    }
    let value = token.parse::<i128>().map_err(|e| e.to_string())?;
    if value < 0 {
        return Err("expected non-negative integer".to_string());
    }
    u64::try_from(value).map_err(|_| "integer value out of range for u64".to_string())
}

fn parse_boolean(raw: &str) -> Result<bool, String> {
    match raw.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err("expected 'true' or 'false'".to_string()),
    }
}
