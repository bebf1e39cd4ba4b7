//! Constants for the download module (timeouts, redirects, validation).

use std::time::Duration;

/// Overall bound on one attempt, request plus body stream.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout of the underlying client.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Redirect hops followed within one attempt.
pub const MAX_REDIRECT_HOPS: u32 = 5;

/// Artifacts smaller than this are never accepted.
pub const MIN_ARTIFACT_BYTES: u64 = 100_000;

/// Fraction of a declared content length an artifact must reach.
pub const MIN_COMPLETENESS_RATIO: f64 = 0.95;

/// Origin sent when the referer has none.
pub const DEFAULT_ORIGIN: &str = "https://www.tiktok.com";
