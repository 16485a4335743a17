//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

use mediacrawl_core::config::FileConfig;

/// Crawl listing sites, skip what was already seen, and fetch the rest.
///
/// Every option can also be set in the config file; flags win.
#[derive(Parser, Debug)]
#[command(name = "mediacrawl")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for crate debug, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only show warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/mediacrawl/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Site catalog (JSON)
    #[arg(long, value_name = "PATH")]
    pub sites_file: Option<PathBuf>,

    /// Print the catalog's site names and exit
    #[arg(long)]
    pub list_sites: bool,

    /// Site to crawl, repeatable; `all` selects every site
    #[arg(short, long = "site", value_name = "NAME")]
    pub sites: Vec<String>,

    /// Search query, repeatable
    #[arg(long = "query", value_name = "TERM")]
    pub queries: Vec<String>,

    /// Category, repeatable
    #[arg(long = "category", value_name = "NAME")]
    pub categories: Vec<String>,

    /// Also crawl each site's index listing
    #[arg(long)]
    pub index: bool,

    /// Facet values as NAME=V1,V2; repeatable
    #[arg(long = "facet", value_name = "NAME=VALUES", value_parser = parse_facet)]
    pub facets: Vec<(String, Vec<String>)>,

    /// Randomise the order of a facet's values, repeatable
    #[arg(long = "shuffle", value_name = "FACET")]
    pub shuffle: Vec<String>,

    /// Randomise site order
    #[arg(long)]
    pub shuffle_sites: bool,

    /// Directory holding the dedup files
    #[arg(long, value_name = "DIR")]
    pub state_dir: Option<PathBuf>,

    /// Root for external-tool downloads
    #[arg(short = 'o', long, value_name = "DIR")]
    pub download_dir: Option<PathBuf>,

    /// Root for direct downloads
    #[arg(long, value_name = "DIR")]
    pub library_dir: Option<PathBuf>,

    /// Copy every direct download here as well
    #[arg(long, value_name = "DIR")]
    pub mirror_dir: Option<PathBuf>,

    /// Pages per target (0 for unlimited)
    #[arg(short = 'p', long)]
    pub max_pages: Option<u32>,

    /// New links per run (0 for unlimited)
    #[arg(short = 'n', long)]
    pub max_artifacts: Option<u64>,

    /// Run budget in minutes (0 for unlimited)
    #[arg(short = 't', long, value_name = "MINUTES")]
    pub max_duration: Option<u64>,

    /// Consecutive skips before a target is abandoned (0 disables)
    #[arg(long)]
    pub skip_threshold: Option<u32>,

    /// Fetch rounds per page (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub fetch_retries: Option<u32>,

    /// Download attempts per link (1-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=100))]
    pub download_retries: Option<u32>,

    /// Seconds to wait between listing pages (max 3600)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(0..=3600))]
    pub page_delay: Option<u64>,

    /// External downloader program
    #[arg(long, value_name = "PATH")]
    pub downloader: Option<PathBuf>,

    /// ffmpeg location passed to the downloader
    #[arg(long, value_name = "PATH")]
    pub ffmpeg: Option<PathBuf>,

    /// Sort option for listings that support it
    #[arg(long)]
    pub sort: Option<String>,

    /// Date filter for listings that support it
    #[arg(long)]
    pub date_filter: Option<String>,

    /// Country filter for listings that support it
    #[arg(long)]
    pub country_filter: Option<String>,

    /// Write debug.log and download.log here
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,
}

impl Args {
    /// The values given on the command line, as a config layer.
    #[must_use]
    pub fn to_file_config(&self) -> FileConfig {
        let list = |values: &[String]| (!values.is_empty()).then(|| values.to_vec());
        let flag = |set: bool| set.then_some(true);

        FileConfig {
            sites_file: self.sites_file.clone(),
            sites: list(&self.sites),
            queries: list(&self.queries),
            categories: list(&self.categories),
            use_index_page: flag(self.index),
            state_dir: self.state_dir.clone(),
            download_dir: self.download_dir.clone(),
            library_dir: self.library_dir.clone(),
            mirror_dir: self.mirror_dir.clone(),
            max_pages: self.max_pages,
            max_artifacts: self.max_artifacts,
            max_duration_minutes: self.max_duration,
            skip_threshold: self.skip_threshold,
            fetch_retries: self.fetch_retries,
            page_delay_secs: self.page_delay,
            download_retries: self.download_retries,
            downloader: self.downloader.clone(),
            ffmpeg: self.ffmpeg.clone(),
            sort_option: self.sort.clone(),
            date_filter: self.date_filter.clone(),
            country_filter: self.country_filter.clone(),
            shuffle_sites: flag(self.shuffle_sites),
            shuffle: list(&self.shuffle),
            facets: self.facets.clone(),
            log_dir: self.log_dir.clone(),
            ..FileConfig::default()
        }
    }
}

fn parse_facet(raw: &str) -> Result<(String, Vec<String>), String> {
    let (name, values) = raw
        .split_once('=')
        .ok_or_else(|| "expected NAME=V1,V2".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("facet name must not be empty".to_string());
    }
    let values: Vec<String> = values
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
        .collect();
    if values.is_empty() {
        return Err(format!("facet '{name}' needs at least one value"));
    }
    Ok((name.to_string(), values))
}
