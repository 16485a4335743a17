use anyhow::{Context, Result};
use mediacrawl_core::config::{self, RunSettings};
use mediacrawl_core::crawl::Crawler;
use mediacrawl_core::download::{DirectHttpTool, YtDlpTool};
use mediacrawl_core::fetch::{Fetcher, HttpClient};
use mediacrawl_core::run::{self, Tools};
use mediacrawl_core::site::SiteCatalog;
use tracing::{debug, info, warn};

use crate::app::exit_handler::{self, ProcessExit};
use crate::app::terminal;
use crate::cli::Args;

pub(crate) async fn run_mediacrawl(args: Args) -> Result<ProcessExit> {
    let (config_path, file_config) =
        config::load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let settings = RunSettings::resolve(args.to_file_config().layered_over(file_config))
        .context("Invalid configuration")?;

    let default_level = terminal::resolve_default_log_level(args.quiet, args.verbose, settings.verbosity);
    terminal::init_tracing(default_level, settings.log_dir.as_deref(), &settings.log_prefix)?;
    debug!(config = ?config_path, "configuration resolved");

    let catalog = SiteCatalog::load(&settings.sites_file).with_context(|| {
        format!("Failed to load site catalog '{}'", settings.sites_file.display())
    })?;

    if args.list_sites {
        for name in catalog.names() {
            println!("{name}");
        }
        return Ok(ProcessExit::Success);
    }

    let sites = catalog.select(&settings.sites)?;
    let targets = run::build_targets(sites, &settings, &mut rand::thread_rng());
    if targets.is_empty() {
        warn!("Nothing to crawl: no site supports the configured queries, categories or index mode");
        return Ok(ProcessExit::Success);
    }
    info!(targets = targets.len(), "mediacrawl starting");

    let client = HttpClient::new(&settings.client).context("Failed to build HTTP client")?;
    let mut direct = DirectHttpTool::new(&client);
    if let Some(mirror) = &settings.mirror_dir {
        direct = direct.with_mirror(mirror);
    }
    let mut external = YtDlpTool::new(&settings.downloader);
    if let Some(ffmpeg) = &settings.ffmpeg {
        external = external.with_ffmpeg(ffmpeg);
    }

    let crawler = Crawler::new(
        Fetcher::new(client, settings.fetch_policy.clone()),
        settings.dedup_store(),
    )
    .with_limits(settings.limits)
    .with_filters(settings.filters.clone());

    let tools = Tools {
        external: &external,
        direct: &direct,
    };
    let summary = run::run(&crawler, tools, &settings, &targets).await;
    summary.log();

    Ok(exit_handler::exit_for_summary(&summary))
}
