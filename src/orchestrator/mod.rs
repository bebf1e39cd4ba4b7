//! Two-phase execution of a frozen candidate list.
//!
//! # Overview
//!
//! The orchestrator walks the candidates strictly in collection order (the
//! primary pass), wrapping every engine call in its own retry loop. Whatever
//! still fails is retried by a bounded recovery sweep, one attempt per
//! candidate per round, with a pause between rounds. Everything runs
//! sequentially: at most one request is in flight at any time.
//!
//! A fresh [`SessionSnapshot`](crate::session::SessionSnapshot) is read from
//! the [`SessionSource`] before every single attempt because the platform's
//! anti-bot tokens rotate per request.

mod report;
mod task;

pub use report::{DownloadReport, FailureEntry};
pub use task::{DownloadTask, TaskError, TaskStatus};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::browser::SessionSource;
use crate::download::{
    DEFAULT_RETRY_DELAY, DEFAULT_WRAPPER_ATTEMPTS, DownloadEngine, DownloadError, EngineConfig,
    FailureType, FetchOutcome, RetryDecision, RetryPolicy, classify_error,
};
use crate::model::Candidate;
use crate::session::SessionSnapshot;

/// Default number of recovery sweep rounds.
pub const DEFAULT_SWEEP_ROUNDS: u32 = 3;

/// Default pause between recovery sweep rounds.
pub const DEFAULT_SWEEP_PAUSE: Duration = Duration::from_secs(5);

/// Default output directory, relative to the working directory.
pub const DEFAULT_OUTPUT_DIR: &str = "downloads";

/// Default artifact file name prefix.
pub const DEFAULT_FILE_PREFIX: &str = "video_";

/// Something that can fetch one resource to disk.
///
/// [`DownloadEngine`] is the production implementation.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` to `destination`; see [`DownloadEngine::fetch`].
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        referer: &str,
        session: &SessionSnapshot,
    ) -> Result<FetchOutcome, DownloadError>;
}

#[async_trait]
impl Fetcher for DownloadEngine {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        referer: &str,
        session: &SessionSnapshot,
    ) -> Result<FetchOutcome, DownloadError> {
        DownloadEngine::fetch(self, url, destination, referer, session).await
    }
}

/// Tunables of the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Attempt wrapper of the primary pass, layered over the engine's own budget.
    ///
    /// Only retryable engine failures consume further wrapper attempts. A
    /// permanent one (missing redirect `Location`, hop limit, malformed URL)
    /// fails the candidate for this pass after a single call, even though the
    /// next snapshot could carry rotated tokens. Such candidates still get one
    /// attempt per recovery sweep round.
    pub primary_policy: RetryPolicy,
    /// Recovery sweep rounds.
    pub sweep_rounds: u32,
    /// Pause between sweep rounds.
    pub sweep_pause: Duration,
    /// Directory artifacts are written to.
    pub output_dir: PathBuf,
    /// File name prefix of every artifact.
    pub file_prefix: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            primary_policy: RetryPolicy::new(DEFAULT_WRAPPER_ATTEMPTS, DEFAULT_RETRY_DELAY),
            sweep_rounds: DEFAULT_SWEEP_ROUNDS,
            sweep_pause: DEFAULT_SWEEP_PAUSE,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl OrchestratorConfig {
    /// Artifact path for `candidate`: `<output_dir>/<prefix><id>.mp4`.
    ///
    /// Characters outside `[A-Za-z0-9_-]` in the id are replaced by `_`.
    #[must_use]
    pub fn destination_for(&self, candidate: &Candidate) -> PathBuf {
        let id: String = candidate
            .id()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.output_dir.join(format!("{}{id}.mp4", self.file_prefix))
    }
}

/// Engine and orchestrator configuration of one run.
#[derive(Debug, Clone, Default)]
pub struct DownloadConfig {
    /// Engine tunables, including its own retry budget.
    pub engine: EngineConfig,
    /// Orchestrator tunables, including the primary attempt wrapper.
    pub orchestrator: OrchestratorConfig,
}

impl DownloadConfig {
    /// Engine attempts a single candidate can receive in the primary pass.
    ///
    /// The two retry layers multiply: with the defaults, 3 wrapper attempts
    /// of 4 engine attempts each make 12 requests before the candidate is
    /// handed to the recovery sweep.
    #[must_use]
    pub fn effective_primary_attempts(&self) -> u32 {
        self.engine
            .retry_policy
            .max_attempts()
            .saturating_mul(self.orchestrator.primary_policy.max_attempts())
    }
}

/// Drives a frozen candidate list to completion.
pub struct DownloadOrchestrator<'a> {
    fetcher: &'a dyn Fetcher,
    session: &'a dyn SessionSource,
    config: OrchestratorConfig,
    referer: String,
}

impl std::fmt::Debug for DownloadOrchestrator<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadOrchestrator")
            .field("config", &self.config)
            .field("referer", &self.referer)
            .finish_non_exhaustive()
    }
}

impl<'a> DownloadOrchestrator<'a> {
    /// Creates an orchestrator. `referer` is the profile page URL.
    #[must_use]
    pub fn new(
        fetcher: &'a dyn Fetcher,
        session: &'a dyn SessionSource,
        config: OrchestratorConfig,
        referer: impl Into<String>,
    ) -> Self {
        Self {
            fetcher,
            session,
            config,
            referer: referer.into(),
        }
    }

    /// The orchestrator's configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Runs the primary pass and the recovery sweep over `candidates`.
    ///
    /// Never fails: every candidate ends up succeeded, failed with its last
    /// error, or skipped for lack of a URL.
    #[instrument(skip_all, fields(candidates = candidates.len()))]
    pub async fn run(&self, candidates: &[Candidate]) -> DownloadReport {
        let mut report = DownloadReport::new();
        let mut tasks: HashMap<&str, DownloadTask> = HashMap::new();
        let total = candidates.len();

        for candidate in candidates {
            if candidate.download_url().is_none() {
                warn!(
                    video = candidate.ordinal(),
                    id = candidate.id(),
                    "no valid URL found for video, skipping"
                );
                report.record_skipped(candidate.id());
                continue;
            }
            info!(
                video = candidate.ordinal(),
                total,
                id = candidate.id(),
                "attempting to download video"
            );
            let task = tasks.entry(candidate.id()).or_insert_with(|| {
                DownloadTask::new(candidate.id(), self.config.destination_for(candidate))
            });
            self.attempt(candidate, task, &self.config.primary_policy, &mut report)
                .await;
        }

        self.recovery_sweep(candidates, &mut tasks, &mut report).await;

        info!(
            succeeded = report.succeeded().len(),
            failed = report.failures().len(),
            skipped = report.skipped().len(),
            "downloads finished"
        );
        report
    }

    /// Attempts `candidate` under `policy`, recording the outcome in `report`.
    ///
    /// Returns `true` once the candidate is in the success set. A candidate
    /// that already succeeded is reported as such without touching the
    /// session source or the fetcher.
    #[instrument(skip_all, fields(id = candidate.id(), video = candidate.ordinal()))]
    pub async fn attempt(
        &self,
        candidate: &Candidate,
        task: &mut DownloadTask,
        policy: &RetryPolicy,
        report: &mut DownloadReport,
    ) -> bool {
        if report.is_succeeded(candidate.id()) {
            debug!("already downloaded successfully");
            return true;
        }
        let Some(url) = candidate.download_url() else {
            warn!("no valid URL found for video, skipping");
            report.record_skipped(candidate.id());
            return false;
        };

        let begun = match task.status() {
            TaskStatus::Pending => task.start(),
            TaskStatus::Failed => task.reopen(),
            TaskStatus::InProgress => Ok(()),
            TaskStatus::Succeeded => {
                report.record_success(candidate.id());
                return true;
            }
        };
        if let Err(e) = begun {
            warn!(error = %e, "task cannot be attempted");
            return false;
        }

        let mut attempt: u32 = 1;
        loop {
            let (message, failure_type) = match self.session.snapshot().await {
                Ok(snapshot) => {
                    let fetched = self
                        .fetcher
                        .fetch(url, task.destination(), &self.referer, &snapshot)
                        .await;
                    match fetched {
                        Ok(outcome) => {
                            if let Err(e) = task.succeed() {
                                warn!(error = %e, "unexpected task state after download");
                            }
                            report.record_success(candidate.id());
                            info!(
                                path = %outcome.path.display(),
                                bytes = outcome.bytes,
                                attempts = outcome.attempts,
                                "successfully downloaded video"
                            );
                            return true;
                        }
                        Err(error) => (error.to_string(), classify_error(&error)),
                    }
                }
                Err(error) => (
                    format!("session snapshot failed: {error}"),
                    FailureType::Retryable,
                ),
            };

            match policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry {
                    delay,
                    attempt: next,
                } => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        error = %message,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    warn!(attempt, error = %message, reason = %reason, "attempt failed");
                    if let Err(e) = task.fail(message.clone()) {
                        warn!(error = %e, "unexpected task state after failure");
                    }
                    report.record_failure(FailureEntry {
                        candidate_id: candidate.id().to_string(),
                        ordinal: candidate.ordinal(),
                        download_url: url.to_string(),
                        last_error: message,
                    });
                    return false;
                }
            }
        }
    }

    async fn recovery_sweep<'c>(
        &self,
        candidates: &'c [Candidate],
        tasks: &mut HashMap<&'c str, DownloadTask>,
        report: &mut DownloadReport,
    ) {
        if report.failures().is_empty() || self.config.sweep_rounds == 0 {
            return;
        }
        let by_id: HashMap<&str, &Candidate> =
            candidates.iter().map(|c| (c.id(), c)).collect();
        let single = RetryPolicy::single_attempt();

        for round in 1..=self.config.sweep_rounds {
            let pending: Vec<String> = report
                .failures()
                .iter()
                .map(|failure| failure.candidate_id.clone())
                .collect();
            info!(
                round,
                rounds = self.config.sweep_rounds,
                failed = pending.len(),
                "retrying failed downloads"
            );

            for id in &pending {
                let (Some(candidate), Some(task)) =
                    (by_id.get(id.as_str()), tasks.get_mut(id.as_str()))
                else {
                    continue;
                };
                self.attempt(candidate, task, &single, report).await;
            }

            if report.failures().is_empty() {
                info!(round, "all failed downloads recovered");
                return;
            }
            if round < self.config.sweep_rounds {
                debug!(
                    pause_ms = self.config.sweep_pause.as_millis(),
                    "pausing before next sweep round"
                );
                tokio::time::sleep(self.config.sweep_pause).await;
            }
        }
    }
}
