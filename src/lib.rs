//! Harvester Core Library
//!
//! This library provides the core functionality for the harvester tool,
//! which bulk-retrieves every video published by a profile on a platform that
//! paginates content through infinite scroll and guards media URLs behind
//! short-lived session cookies.
//!
//! # Architecture
//!
//! Data flows one way, leaf-first:
//!
//! - [`acquisition`] - Scroll-driven, deduplicating candidate collection
//! - [`download`] - Resilient single-resource download engine
//! - [`orchestrator`] - Primary pass plus bounded recovery sweep
//! - [`report`] - Final JSON run report
//!
//! Supporting modules:
//! - [`browser`] - Capability traits for the browser automation collaborator
//! - [`model`] - Candidate and rendition types
//! - [`session`] - Session snapshots and cookie handling

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquisition;
pub mod browser;
pub mod download;
pub mod model;
pub mod orchestrator;
pub mod report;
pub mod session;
mod user_agent;

// Re-export commonly used types
pub use acquisition::{
    Acquisition, AcquisitionCollector, AcquisitionConfig, AcquisitionError, StopReason, acquire,
};
pub use browser::{
    Browser, BrowserError, CountProvider, ItemPresenceProvider, PageDriver, ReplayBrowser,
    SessionSource,
};
pub use download::{
    DownloadEngine, DownloadError, EngineConfig, EngineError, FailureType, FetchOutcome,
    LogProgress, ProgressObserver, RetryDecision, RetryPolicy, classify_error, completion_percent,
    megabytes, progress_message,
};
pub use model::{Candidate, Rendition};
pub use orchestrator::{
    DownloadConfig, DownloadOrchestrator, DownloadReport, DownloadTask, FailureEntry, Fetcher,
    OrchestratorConfig, TaskStatus,
};
pub use report::{ReportError, RunReport};
pub use session::{SessionCookie, SessionSnapshot};
