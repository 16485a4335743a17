//! Tracing subscriber setup: console plus optional log files.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use mediacrawl_core::config::VerbositySetting;
use mediacrawl_core::events::ARTIFACT;
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Console log level.
///
/// Priority: `--quiet` > `-v` count > config `verbosity` > info. `RUST_LOG`
/// still wins over all of these in [`init_tracing`].
pub(crate) fn resolve_default_log_level(
    quiet: bool,
    verbose: u8,
    configured: VerbositySetting,
) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => match configured {
            VerbositySetting::Default => "info",
            VerbositySetting::Verbose => "info,mediacrawl_core=debug,mediacrawl=debug",
            VerbositySetting::Quiet => "warn",
            VerbositySetting::Debug => "debug",
        },
        1 => "info,mediacrawl_core=debug,mediacrawl=debug",
        2 => "debug",
        _ => "trace",
    }
}

/// Installs the global subscriber.
///
/// With `log_dir`, two files are appended to: `<prefix>debug.log` receives
/// every debug-or-higher event, `<prefix>download.log` only the artifact
/// channel.
pub(crate) fn init_tracing(default_level: &str, log_dir: Option<&Path>, prefix: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let console = fmt::layer().with_writer(std::io::stderr).with_filter(filter);

    let (debug_file, artifact_file) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory '{}'", dir.display()))?;
            let debug = open_log(&dir.join(format!("{prefix}debug.log")))?;
            let artifact = open_log(&dir.join(format!("{prefix}download.log")))?;
            (
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(debug))
                        .with_filter(LevelFilter::DEBUG),
                ),
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(artifact))
                        .with_filter(Targets::new().with_target(ARTIFACT, LevelFilter::INFO)),
                ),
            )
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(console)
        .with(debug_file)
        .with(artifact_file)
        .try_init();
    Ok(())
}

fn open_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))
}
