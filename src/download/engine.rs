//! Resilient single-resource download engine.
//!
//! [`DownloadEngine::fetch`] drives one resource through an explicit state
//! machine: request, follow redirects, stream to disk, validate, and retry
//! with a fixed delay while the budget lasts.
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::{DownloadEngine, EngineConfig, SessionSnapshot};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(EngineConfig::default())?;
//! let outcome = engine
//!     .fetch(
//!         "https://cdn.example.com/video.mp4",
//!         Path::new("downloads/video_1.mp4"),
//!         "https://www.tiktok.com/@someone",
//!         &SessionSnapshot::default(),
//!     )
//!     .await?;
//! println!("{} bytes in {} attempt(s)", outcome.bytes, outcome.attempts);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, LOCATION};
use reqwest::{Client, StatusCode};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{
    CONNECT_TIMEOUT, MAX_REDIRECT_HOPS, MIN_ARTIFACT_BYTES, MIN_COMPLETENESS_RATIO,
    REQUEST_TIMEOUT,
};
use super::headers::compose_headers;
use super::progress::{LogProgress, ProgressObserver};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};
use super::validation::{ArtifactRejection, check_artifact};
use super::DownloadError;
use crate::session::SessionSnapshot;
use crate::user_agent::default_device_user_agent;

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// Tunables of the download engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Attempts per fetch and the fixed wait between them.
    pub retry_policy: RetryPolicy,
    /// Overall bound on one attempt, request plus body stream.
    pub request_timeout: Duration,
    /// Connect timeout of the HTTP client.
    pub connect_timeout: Duration,
    /// Redirect hops followed within one attempt.
    pub max_redirect_hops: u32,
    /// Artifacts smaller than this are rejected.
    pub min_artifact_bytes: u64,
    /// Fraction of a declared content length an artifact must reach.
    pub min_completeness_ratio: f64,
    /// Device identity sent as `User-Agent` unless the session overrides it.
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicy::default(),
            request_timeout: REQUEST_TIMEOUT,
            connect_timeout: CONNECT_TIMEOUT,
            max_redirect_hops: MAX_REDIRECT_HOPS,
            min_artifact_bytes: MIN_ARTIFACT_BYTES,
            min_completeness_ratio: MIN_COMPLETENESS_RATIO,
            user_agent: default_device_user_agent(),
        }
    }
}

/// A successfully fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutcome {
    /// Where the artifact was written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Declared content length, if the server sent one.
    pub content_length: Option<u64>,
    /// Attempts used, including the successful one.
    pub attempts: u32,
    /// URL the body was finally served from, after redirects.
    pub final_url: String,
}

/// Per-attempt bookkeeping that survives the attempt future being dropped on timeout.
#[derive(Debug, Default)]
struct AttemptState {
    created_file: AtomicBool,
    received: AtomicU64,
}

/// Fetches one resource at a time to local storage.
///
/// The underlying client never follows redirects on its own; the engine
/// follows 301/302 itself so hops do not consume retry budget.
pub struct DownloadEngine {
    client: Client,
    config: EngineConfig,
    progress: Arc<dyn ProgressObserver>,
}

impl fmt::Debug for DownloadEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DownloadEngine {
    /// Creates an engine that reports progress through [`LogProgress`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(EngineError::ClientBuild)?;
        Ok(Self {
            client,
            config,
            progress: Arc::new(LogProgress::new()),
        })
    }

    /// Replaces the progress observer.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// The engine's configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Fetches `url` to `destination`.
    ///
    /// `referer` is the profile page the resource was discovered on; `session`
    /// supplies cookies and header overrides and is only read.
    ///
    /// # Errors
    ///
    /// Permanent failures ([`DownloadError::MissingRedirectLocation`],
    /// [`DownloadError::RedirectLimit`], [`DownloadError::InvalidUrl`]) are
    /// returned at once. Retryable failures are retried with the configured
    /// fixed delay; when the budget runs out the last one is returned wrapped
    /// in [`DownloadError::Exhausted`]. No partial file survives an error.
    #[instrument(skip(self, destination, referer, session), fields(path = %destination.display()))]
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        referer: &str,
        session: &SessionSnapshot,
    ) -> Result<FetchOutcome, DownloadError> {
        let mut current = Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;
        let headers = compose_headers(&self.config.user_agent, referer, session);
        let policy = &self.config.retry_policy;
        let mut attempt: u32 = 1;

        loop {
            let state = AttemptState::default();
            let bounded = tokio::time::timeout(
                self.config.request_timeout,
                self.attempt(&mut current, destination, &headers, &state),
            )
            .await;
            let result = match bounded {
                Ok(result) => result,
                Err(_) => Err(DownloadError::timeout(
                    current.as_str(),
                    self.config.request_timeout,
                )),
            };

            let error = match result {
                Ok((bytes, content_length)) => {
                    self.progress.finished(bytes, true);
                    info!(bytes, attempt, "download complete");
                    return Ok(FetchOutcome {
                        path: destination.to_path_buf(),
                        bytes,
                        content_length,
                        attempts: attempt,
                        final_url: current.to_string(),
                    });
                }
                Err(error) => error,
            };

            if state.created_file.load(Ordering::SeqCst) {
                self.progress
                    .finished(state.received.load(Ordering::SeqCst), false);
                remove_partial(destination).await;
            }

            let failure_type = classify_error(&error);
            match policy.should_retry(failure_type, attempt) {
                RetryDecision::Retry { delay, attempt: next } => {
                    warn!(
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        error = %error,
                        "download attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt = next;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(attempt, reason = %reason, "not retrying");
                    return Err(match failure_type {
                        FailureType::Permanent => error,
                        FailureType::Retryable => DownloadError::exhausted(attempt, error),
                    });
                }
            }
        }
    }

    /// One attempt: request, follow redirects, stream, validate.
    ///
    /// Updates `current` on every redirect hop so a retry restarts where the
    /// failure happened.
    async fn attempt(
        &self,
        current: &mut Url,
        destination: &Path,
        headers: &HeaderMap,
        state: &AttemptState,
    ) -> Result<(u64, Option<u64>), DownloadError> {
        let start = current.to_string();
        let mut hops: u32 = 0;

        let response = loop {
            debug!(url = %current, "requesting");
            let response = self
                .client
                .get(current.clone())
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| DownloadError::network(current.as_str(), e))?;
            let status = response.status();

            if status == StatusCode::MOVED_PERMANENTLY || status == StatusCode::FOUND {
                let Some(location) = response.headers().get(LOCATION) else {
                    return Err(DownloadError::missing_redirect_location(
                        current.as_str(),
                        status.as_u16(),
                    ));
                };
                hops += 1;
                if hops > self.config.max_redirect_hops {
                    return Err(DownloadError::redirect_limit(
                        start,
                        self.config.max_redirect_hops,
                    ));
                }
                let location = location
                    .to_str()
                    .map_err(|_| DownloadError::invalid_url(format!("{location:?}")))?;
                let next = current
                    .join(location)
                    .map_err(|_| DownloadError::invalid_url(location))?;
                debug!(hop = hops, from = %current, to = %next, "following redirect");
                *current = next;
                continue;
            }

            if status != StatusCode::OK && status != StatusCode::PARTIAL_CONTENT {
                return Err(DownloadError::http_status(current.as_str(), status.as_u16()));
            }
            break response;
        };

        let content_length = response.content_length();

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }
        let file = File::create(destination)
            .await
            .map_err(|e| DownloadError::io(destination, e))?;
        state.created_file.store(true, Ordering::SeqCst);

        let label = destination.file_name().map_or_else(
            || destination.display().to_string(),
            |name| name.to_string_lossy().into_owned(),
        );
        self.progress.started(&label, content_length);

        let mut writer = BufWriter::new(file);
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| DownloadError::network(current.as_str(), e))?;
            writer
                .write_all(&chunk)
                .await
                .map_err(|e| DownloadError::io(destination, e))?;
            received += chunk.len() as u64;
            state.received.store(received, Ordering::SeqCst);
            self.progress.advanced(received, content_length);
        }
        writer
            .flush()
            .await
            .map_err(|e| DownloadError::io(destination, e))?;

        if let Err(rejection) = check_artifact(
            received,
            content_length,
            self.config.min_artifact_bytes,
            self.config.min_completeness_ratio,
        ) {
            match rejection {
                ArtifactRejection::BelowFloor => debug!(
                    received,
                    floor = self.config.min_artifact_bytes,
                    "artifact below size floor"
                ),
                ArtifactRejection::BelowDeclared => debug!(
                    received,
                    content_length,
                    "artifact short of declared length"
                ),
            }
            return Err(DownloadError::incomplete_artifact(
                destination,
                received,
                content_length,
            ));
        }

        Ok((received, content_length))
    }
}

/// Deletes a partial artifact. A file that is already gone is fine.
async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove partial file"),
    }
}
