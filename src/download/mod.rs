//! Resilient download of a single remote media resource.
//!
//! # Features
//!
//! - Header composition from a fixed baseline, the session cookie jar and
//!   captured header overrides
//! - Manual 301/302 following with a per-attempt hop limit
//! - Streaming writes with live progress
//! - Size validation against a floor and the declared content length
//! - Fixed-delay retry of transient failures, deleting partial files first
//!
//! Both retry layers of a run (the engine's own budget and the orchestrator's
//! attempt wrapper) use [`RetryPolicy`].

mod constants;
mod engine;
mod error;
mod headers;
mod progress;
mod retry;
mod validation;

pub use constants::{
    CONNECT_TIMEOUT, DEFAULT_ORIGIN, MAX_REDIRECT_HOPS, MIN_ARTIFACT_BYTES,
    MIN_COMPLETENESS_RATIO, REQUEST_TIMEOUT,
};
pub use engine::{DownloadEngine, EngineConfig, EngineError, FetchOutcome};
pub use error::DownloadError;
pub use progress::{
    LogProgress, ProgressObserver, completion_percent, megabytes, progress_message,
};
pub use retry::{
    DEFAULT_ENGINE_ATTEMPTS, DEFAULT_RETRY_DELAY, DEFAULT_WRAPPER_ATTEMPTS, FailureType,
    RetryDecision, RetryPolicy, classify_error,
};
