//! Capability interface of the browser automation collaborator.
//!
//! The engine that renders the profile page, intercepts its network traffic
//! and exposes DOM and cookie state lives outside this crate. Acquisition and
//! orchestration only see the narrow traits below:
//!
//! - [`PageDriver`] - navigation, scrolling, page height, response interception
//! - [`CountProvider`] - best-effort displayed item counter
//! - [`ItemPresenceProvider`] - number of rendered item elements
//! - [`SessionSource`] - fresh cookie/header snapshot
//!
//! [`ReplayBrowser`] implements all four by playing back a captured session.

mod replay;

pub use replay::{CAPTURED_RESPONSE_URL, ReplayBrowser};

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::session::{CookieError, SessionSnapshot};

/// Errors surfaced by a browser backend.
#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    /// The page could not be loaded.
    #[error("navigation to {url} failed: {reason}")]
    Navigation {
        /// Target URL.
        url: String,
        /// Backend-specific description.
        reason: String,
    },

    /// A DOM query or scroll command failed.
    #[error("page evaluation failed: {0}")]
    Evaluation(String),

    /// The backend is not usable (not launched, closed, crashed).
    #[error("browser session unavailable: {0}")]
    Unavailable(String),

    /// A capture file could not be read.
    #[error("failed to read capture {path}: {source}")]
    CaptureIo {
        /// Path of the capture file.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A capture file did not contain what was expected.
    #[error("malformed capture {path}: {reason}")]
    MalformedCapture {
        /// Path of the capture file.
        path: PathBuf,
        /// Description of what was wrong.
        reason: String,
    },

    /// The cookie export could not be parsed.
    #[error("failed to load session cookies: {0}")]
    Cookies(#[from] CookieError),
}

/// Navigation, scrolling and response interception.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url` in the page.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Subscribes to responses whose URL contains `url_filter`.
    ///
    /// Each intercepted response body is delivered decoded. Subscribe before
    /// navigating to observe the responses of the initial load.
    fn subscribe_responses(&self, url_filter: &str) -> mpsc::UnboundedReceiver<serde_json::Value>;

    /// Scrolls to the end of the currently rendered content.
    async fn scroll_to_end(&self) -> Result<(), BrowserError>;

    /// Total scrollable height of the page.
    async fn page_height(&self) -> Result<u64, BrowserError>;
}

/// Best-effort displayed item counter (e.g. "1,234 videos" on the profile header).
#[async_trait]
pub trait CountProvider: Send + Sync {
    /// Returns the first positive count found among `indicators`, tried in order.
    ///
    /// Implementations may wait for the indicators to render; callers bound the
    /// wait with their own timeout.
    async fn displayed_count(&self, indicators: &[String]) -> Result<Option<u64>, BrowserError>;
}

/// Number of rendered item elements.
#[async_trait]
pub trait ItemPresenceProvider: Send + Sync {
    /// Counts elements matching `item_selector`.
    async fn rendered_item_count(&self, item_selector: &str) -> Result<u64, BrowserError>;
}

/// Source of fresh session snapshots.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Reads the current cookie jar and latest outgoing request headers.
    async fn snapshot(&self) -> Result<SessionSnapshot, BrowserError>;
}

/// A backend offering every capability.
pub trait Browser: PageDriver + CountProvider + ItemPresenceProvider + SessionSource {}

impl<T> Browser for T where T: PageDriver + CountProvider + ItemPresenceProvider + SessionSource {}
