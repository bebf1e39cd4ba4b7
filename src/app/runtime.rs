//! One harvester run: acquire, download, report.

use anyhow::{Context, Result, bail};
use harvester_core::{
    DownloadEngine, DownloadOrchestrator, ReplayBrowser, RunReport, acquire,
};
use tracing::{debug, info, warn};

use crate::ProcessExit;
use crate::app::config::LoadedConfig;
use crate::app::{output, progress};
use crate::cli::Args;

/// Runs acquisition and downloads for `args.profile_url`.
///
/// Only start-up problems (configuration, captured session, opening the
/// profile page, building the client, writing the report) are errors; download
/// failures are reported and reflected in the exit outcome.
pub(crate) async fn run_harvester(args: &Args, loaded: &LoadedConfig) -> Result<ProcessExit> {
    let file = &loaded.config;
    if let Some(path) = &loaded.path {
        debug!(path = %path.display(), from_file = loaded.loaded_from_file, "configuration resolved");
    }

    let Some(capture_dir) = file.capture_dir.as_deref() else {
        bail!(
            "No browser session configured: set `capture_dir` in the config file \
             (or point HARVESTER_CONFIG at one)"
        );
    };
    let browser = ReplayBrowser::from_capture_dir(
        capture_dir,
        file.cookies_file.as_deref(),
        file.headers_file.as_deref(),
    )
    .with_context(|| format!("Failed to load browser session from '{}'", capture_dir.display()))?;

    let mut acquisition = acquire(&browser, &args.profile_url, &file.acquisition_config())
        .await
        .context("Failed to start acquisition")?;
    info!(
        handle = %acquisition.profile_handle,
        candidates = acquisition.candidates.len(),
        estimated_total = acquisition.estimated_total,
        stop_reason = %acquisition.stop_reason,
        "acquisition finished"
    );
    if acquisition.candidates.is_empty() {
        warn!("no videos collected for this profile");
    }

    let download_config = file.download_config();
    let engine = DownloadEngine::new(download_config.engine)
        .context("Failed to initialize download engine")?
        .with_progress(progress::select_progress(args.quiet));
    let orchestrator = DownloadOrchestrator::new(
        &engine,
        &browser,
        download_config.orchestrator,
        args.profile_url.as_str(),
    );
    let downloads = orchestrator.run(&acquisition.candidates).await;

    let report_path = file.report_path();
    let report = RunReport::new(
        std::mem::take(&mut acquisition.raw_payloads),
        acquisition.estimated_total,
        &downloads,
    );
    report
        .write_to(&report_path)
        .await
        .context("Failed to write run report")?;

    if !args.quiet {
        output::print_summary(&acquisition, &downloads, &report_path);
    }

    Ok(ProcessExit::from_download_counts(
        downloads.succeeded().len(),
        downloads.failures().len(),
    ))
}
