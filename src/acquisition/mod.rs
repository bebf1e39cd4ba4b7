//! Scroll-driven, deduplicating candidate acquisition.
//!
//! The acquisition driver opens the profile page, subscribes to the paginated
//! item-list responses the page fetches while it is scrolled, and feeds them
//! to an [`AcquisitionCollector`]. Scrolling stops according to the
//! [`StopReason`] policy tracked by a [`ScrollTracker`].
//!
//! # Example
//!
//! ```no_run
//! use harvester_core::{AcquisitionConfig, ReplayBrowser, acquire};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let browser = ReplayBrowser::new(Vec::new());
//! let acquisition = acquire(
//!     &browser,
//!     "https://www.tiktok.com/@someone",
//!     &AcquisitionConfig::default(),
//! )
//! .await?;
//! println!("{} candidates", acquisition.candidates.len());
//! # Ok(())
//! # }
//! ```

mod collector;
mod count;
mod payload;
mod scroll;

pub use collector::AcquisitionCollector;
pub use count::parse_count_text;
pub use scroll::{ScrollTracker, StopReason};

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use crate::browser::{BrowserError, CountProvider, ItemPresenceProvider, PageDriver};
use crate::model::Candidate;
use count::discover_displayed_count;

/// Wait after each scroll before the page is re-measured.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Consecutive no-growth rounds that end acquisition.
pub const DEFAULT_STABILITY_THRESHOLD: u32 = 3;

/// Hard cap on scroll rounds.
pub const DEFAULT_MAX_SCROLL_ROUNDS: u32 = 50;

/// Bound on displayed-count discovery before falling back to rendered items.
pub const DEFAULT_COUNT_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait after the last scroll so late responses still land.
pub const DEFAULT_GRACE_DELAY: Duration = Duration::from_secs(3);

/// URL substring identifying paginated item-list responses.
pub const DEFAULT_RESPONSE_FILTER: &str = "item_list";

/// Selector matching one rendered item on the profile grid.
pub const DEFAULT_ITEM_SELECTOR: &str = "[data-e2e=\"user-post-item\"]";

/// Count indicators tried in order.
pub const DEFAULT_COUNT_INDICATORS: [&str; 4] = [
    ".video-count strong",
    "[data-e2e=\"user-post-count\"]",
    ".count-infos .number",
    ".video-count",
];

/// Tunables of one acquisition run.
#[derive(Debug, Clone)]
pub struct AcquisitionConfig {
    /// Wait after each scroll before re-measuring.
    pub settle_delay: Duration,
    /// Consecutive no-growth rounds that end acquisition.
    pub stability_threshold: u32,
    /// Hard cap on scroll rounds.
    pub max_scroll_rounds: u32,
    /// Bound on displayed-count discovery.
    pub count_timeout: Duration,
    /// Wait after the last scroll before the collector is frozen.
    pub grace_delay: Duration,
    /// URL substring of intercepted responses.
    pub response_filter: String,
    /// Count indicator selectors, tried in order.
    pub count_indicators: Vec<String>,
    /// Selector of one rendered item.
    pub item_selector: String,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            max_scroll_rounds: DEFAULT_MAX_SCROLL_ROUNDS,
            count_timeout: DEFAULT_COUNT_TIMEOUT,
            grace_delay: DEFAULT_GRACE_DELAY,
            response_filter: DEFAULT_RESPONSE_FILTER.to_string(),
            count_indicators: DEFAULT_COUNT_INDICATORS
                .iter()
                .map(ToString::to_string)
                .collect(),
            item_selector: DEFAULT_ITEM_SELECTOR.to_string(),
        }
    }
}

/// Fatal acquisition failures. Everything else degrades to a warning.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The profile URL does not name a profile.
    #[error("invalid profile URL '{url}': {reason}")]
    InvalidProfileUrl {
        /// The URL as given.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The profile page could not be opened.
    #[error("failed to open profile page: {0}")]
    Startup(#[source] BrowserError),
}

impl AcquisitionError {
    fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidProfileUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

/// Frozen result of an acquisition run.
#[derive(Debug, Clone)]
pub struct Acquisition {
    /// Target profile handle, without `@`.
    pub profile_handle: String,
    /// Deduplicated, author-filtered candidates in arrival order.
    pub candidates: Vec<Candidate>,
    /// Every intercepted payload, in arrival order.
    pub raw_payloads: Vec<Value>,
    /// Count shown by the profile page, or the rendered-item fallback.
    pub displayed_count: u64,
    /// Best available total: max of the displayed count and any count observed live.
    pub estimated_total: u64,
    /// Why scrolling stopped.
    pub stop_reason: StopReason,
    /// Scroll rounds performed.
    pub rounds: u32,
}

/// Extracts the profile handle from a profile URL.
///
/// The handle is the path segment starting with `@`, without the `@`.
///
/// # Errors
///
/// Returns [`AcquisitionError::InvalidProfileUrl`] when the URL does not parse
/// or has no non-empty `@handle` segment.
pub fn profile_handle_from_url(profile_url: &str) -> Result<String, AcquisitionError> {
    let parsed = url::Url::parse(profile_url)
        .map_err(|e| AcquisitionError::invalid_url(profile_url, e.to_string()))?;

    let segment = parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|segment| segment.starts_with('@')))
        .ok_or_else(|| AcquisitionError::invalid_url(profile_url, "no @handle in path"))?;

    let handle = urlencoding::decode(&segment[1..])
        .map_err(|e| AcquisitionError::invalid_url(profile_url, e.to_string()))?;
    if handle.is_empty() {
        return Err(AcquisitionError::invalid_url(profile_url, "empty @handle"));
    }
    Ok(handle.into_owned())
}

/// Scrolls to the end of the rendered content and waits for it to settle.
///
/// # Errors
///
/// Propagates the browser's scroll failure.
pub async fn request_more_content<B>(browser: &B, settle_delay: Duration) -> Result<(), BrowserError>
where
    B: PageDriver + ?Sized,
{
    browser.scroll_to_end().await?;
    tokio::time::sleep(settle_delay).await;
    Ok(())
}

/// Runs acquisition for `profile_url` against `browser`.
///
/// Only an unusable profile URL or a failed initial navigation is fatal.
/// Scroll or measurement failures mid-run end scrolling early with
/// [`StopReason::Interrupted`] and keep what was collected.
///
/// # Errors
///
/// See [`AcquisitionError`].
#[instrument(skip(browser, config), fields(profile = %profile_url))]
pub async fn acquire<B>(
    browser: &B,
    profile_url: &str,
    config: &AcquisitionConfig,
) -> Result<Acquisition, AcquisitionError>
where
    B: PageDriver + CountProvider + ItemPresenceProvider + ?Sized,
{
    let profile_handle = profile_handle_from_url(profile_url)?;
    info!(handle = %profile_handle, "collecting videos for profile");

    let mut collector = AcquisitionCollector::new(profile_handle.clone());
    let mut responses = browser.subscribe_responses(&config.response_filter);

    browser
        .navigate(profile_url)
        .await
        .map_err(AcquisitionError::Startup)?;
    drain(&mut responses, &mut collector);

    let displayed_count = discover_displayed_count(
        browser,
        &config.count_indicators,
        &config.item_selector,
        config.count_timeout,
    )
    .await;
    info!(displayed_count, "initial video count on profile");

    let mut tracker = ScrollTracker::new(config.stability_threshold, config.max_scroll_rounds);
    let stop_reason = loop {
        if let Err(e) = request_more_content(browser, config.settle_delay).await {
            warn!(error = %e, "scroll failed, stopping acquisition early");
            break StopReason::Interrupted;
        }
        drain(&mut responses, &mut collector);

        let measured = async {
            let height = browser.page_height().await?;
            let items = browser.rendered_item_count(&config.item_selector).await?;
            Ok::<_, BrowserError>((height, items))
        }
        .await;
        let (height, items) = match measured {
            Ok(measured) => measured,
            Err(e) => {
                warn!(error = %e, "page measurement failed, stopping acquisition early");
                break StopReason::Interrupted;
            }
        };
        info!(round = tracker.rounds() + 1, loaded = items, "loaded videos");

        if let Some(reason) = tracker.record_round(height, items) {
            break reason;
        }
    };
    info!(reason = %stop_reason, rounds = tracker.rounds(), "scrolling finished");

    tokio::time::sleep(config.grace_delay).await;
    drain(&mut responses, &mut collector);

    let estimated_total = displayed_count.max(tracker.max_items_seen());
    let (candidates, raw_payloads) = collector.into_parts();
    if candidates.len() as u64 != estimated_total {
        warn!(
            collected = candidates.len(),
            estimated_total, "collected video count differs from profile estimate"
        );
    }
    info!(
        candidates = candidates.len(),
        payloads = raw_payloads.len(),
        "acquisition complete"
    );

    Ok(Acquisition {
        profile_handle,
        candidates,
        raw_payloads,
        displayed_count,
        estimated_total,
        stop_reason,
        rounds: tracker.rounds(),
    })
}

fn drain(responses: &mut mpsc::UnboundedReceiver<Value>, collector: &mut AcquisitionCollector) {
    let mut drained = 0usize;
    while let Ok(payload) = responses.try_recv() {
        collector.observe(payload);
        drained += 1;
    }
    if drained > 0 {
        debug!(drained, "drained intercepted responses");
    }
}
