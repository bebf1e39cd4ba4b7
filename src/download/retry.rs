//! Fixed-delay retry policy shared by the engine and the orchestrator.
//!
//! A failed fetch is classified into a [`FailureType`]; the [`RetryPolicy`]
//! then decides from the failure type and the attempt count whether another
//! attempt is made and how long to wait first. The delay is constant between
//! attempts, never exponential.
//!
//! # Example
//!
//! ```
//! use harvester_core::download::{
//!     DownloadError, FailureType, RetryDecision, RetryPolicy, classify_error,
//! };
//!
//! let policy = RetryPolicy::default();
//! let error = DownloadError::http_status("https://example.com/video.mp4", 503);
//!
//! match policy.should_retry(classify_error(&error), 1) {
//!     RetryDecision::Retry { delay, attempt } => {
//!         println!("retrying in {delay:?} (attempt {attempt})");
//!     }
//!     RetryDecision::DoNotRetry { reason } => println!("giving up: {reason}"),
//! }
//! ```

use std::time::Duration;

use tracing::{debug, instrument};

use super::DownloadError;

/// Attempts the engine makes per fetch: the initial one plus three retries.
pub const DEFAULT_ENGINE_ATTEMPTS: u32 = 4;

/// Attempts the orchestrator's wrapper makes per candidate in the primary pass.
pub const DEFAULT_WRAPPER_ATTEMPTS: u32 = 3;

/// Wait between attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Classification of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// May succeed on another attempt (bad status, short artifact, transport
    /// failure, timeout, exhausted inner budget).
    Retryable,

    /// Will not succeed no matter how often it is tried (missing redirect
    /// target, redirect loop, unusable URL).
    Permanent,
}

/// Decision on whether to make another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after `delay`.
    Retry {
        /// How long to wait first.
        delay: Duration,
        /// Number of the next attempt (1-indexed, so the first retry is 2).
        attempt: u32,
    },

    /// Stop.
    DoNotRetry {
        /// Why no further attempt is made.
        reason: String,
    },
}

/// Bounded, fixed-delay retry budget.
///
/// `max_attempts` counts the initial attempt, so a budget of "3 additional
/// attempts" is `max_attempts = 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ENGINE_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy. `max_attempts` is clamped to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub fn single_attempt() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait between attempts.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Decides whether attempt number `attempt` (1-indexed) is followed by another.
    #[instrument(level = "trace", skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = self.delay.as_millis(),
            "will retry"
        );
        RetryDecision::Retry {
            delay: self.delay,
            attempt: attempt + 1,
        }
    }
}

/// Classifies a download error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | `HttpStatus` (any non-200/206) | Retryable |
/// | `IncompleteArtifact` | Retryable |
/// | `Network` | Retryable |
/// | `Timeout` | Retryable |
/// | `Io` | Retryable |
/// | `Exhausted` | Retryable |
/// | `MissingRedirectLocation` | Permanent |
/// | `RedirectLimit` | Permanent |
/// | `InvalidUrl` | Permanent |
///
/// Write errors take the same retry path as transport errors; the engine
/// deletes the partial file before every retry.
#[must_use]
pub fn classify_error(error: &DownloadError) -> FailureType {
    match error {
        DownloadError::HttpStatus { .. }
        | DownloadError::IncompleteArtifact { .. }
        | DownloadError::Network { .. }
        | DownloadError::Timeout { .. }
        | DownloadError::Io { .. }
        | DownloadError::Exhausted { .. } => FailureType::Retryable,

        DownloadError::MissingRedirectLocation { .. }
        | DownloadError::RedirectLimit { .. }
        | DownloadError::InvalidUrl { .. } => FailureType::Permanent,
    }
}
