//! CLI entry point for the harvester tool.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};

mod app;
mod cli;

use app::config::{self, LoadedConfig};
use cli::Args;

/// Outcome of a completed run, mapped to the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Every collected video was downloaded.
    Success,
    /// Some downloads failed.
    Partial,
    /// Nothing could be downloaded.
    Failure,
}

impl ProcessExit {
    /// Skipped candidates count as neither; a run with nothing to download succeeds.
    pub(crate) fn from_download_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::Success,
            (0, _) => Self::Failure,
            _ => Self::Partial,
        }
    }

    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
            Self::Partial => 2,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();
    let loaded = config::load_config()?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_level(&args, &loaded)));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    debug!(?args, "CLI arguments parsed");
    info!("Harvester starting");

    let exit = app::runtime::run_harvester(&args, &loaded).await?;
    Ok(ExitCode::from(exit.code()))
}

/// Priority: quiet flag > verbose flag > config verbosity > info.
/// `RUST_LOG` overrides all of them.
fn default_log_level(args: &Args, loaded: &LoadedConfig) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => loaded
            .config
            .verbosity
            .map_or("info", config::VerbositySetting::log_level),
        1 => "debug",
        _ => "trace",
    }
}
