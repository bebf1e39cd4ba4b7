//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so a failure entry in
//! the final report is actionable on its own.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while fetching one resource.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Redirect response without a `Location` header.
    #[error("HTTP {status} redirect from {url} has no Location header")]
    MissingRedirectLocation {
        /// The URL that answered with the redirect.
        url: String,
        /// The redirect status code.
        status: u16,
    },

    /// Too many redirect hops within one attempt.
    #[error("too many redirects (more than {limit}) starting at {url}")]
    RedirectLimit {
        /// The URL where the redirect chain started.
        url: String,
        /// The hop limit that was exceeded.
        limit: u32,
    },

    /// Response status other than 200 or 206.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that answered with the status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The written artifact failed size validation and was deleted.
    #[error("incomplete download at {path}: {actual_bytes} bytes{}", expected_suffix(.expected_bytes))]
    IncompleteArtifact {
        /// Where the artifact was written.
        path: PathBuf,
        /// Bytes actually written.
        actual_bytes: u64,
        /// Declared content length, if any.
        expected_bytes: Option<u64>,
    },

    /// Connection or stream failure.
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL being fetched.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The attempt exceeded its overall time bound and was aborted.
    #[error("timeout after {after:?} downloading {url}")]
    Timeout {
        /// The URL being fetched.
        url: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// File system error while creating or writing the artifact.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The URL (or a redirect target) is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// Every attempt of the retry budget failed.
    #[error("download failed after {attempts} attempts: {last}")]
    Exhausted {
        /// Attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        last: Box<DownloadError>,
    },
}

#[allow(clippy::ref_option)]
fn expected_suffix(expected: &Option<u64>) -> String {
    expected.map_or_else(
        || " (no content length declared)".to_string(),
        |expected| format!(" of {expected} declared"),
    )
}

impl DownloadError {
    /// Creates a missing-Location error.
    pub fn missing_redirect_location(url: impl Into<String>, status: u16) -> Self {
        Self::MissingRedirectLocation {
            url: url.into(),
            status,
        }
    }

    /// Creates a redirect-limit error.
    pub fn redirect_limit(url: impl Into<String>, limit: u32) -> Self {
        Self::RedirectLimit {
            url: url.into(),
            limit,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an incomplete-artifact error.
    pub fn incomplete_artifact(
        path: impl Into<PathBuf>,
        actual_bytes: u64,
        expected_bytes: Option<u64>,
    ) -> Self {
        Self::IncompleteArtifact {
            path: path.into(),
            actual_bytes,
            expected_bytes,
        }
    }

    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            url: url.into(),
            after,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Wraps the final failure of an exhausted retry budget.
    #[must_use]
    pub fn exhausted(attempts: u32, last: DownloadError) -> Self {
        Self::Exhausted {
            attempts,
            last: Box::new(last),
        }
    }

    /// The innermost cause, looking through [`DownloadError::Exhausted`].
    #[must_use]
    pub fn root_cause(&self) -> &DownloadError {
        match self {
            Self::Exhausted { last, .. } => last.root_cause(),
            other => other,
        }
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: every variant needs
// the URL or path as context, which the helper constructors take.
