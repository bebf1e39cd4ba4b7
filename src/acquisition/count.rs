//! Best-effort discovery of the profile's displayed item count.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::browser::{CountProvider, ItemPresenceProvider};

#[allow(clippy::expect_used)]
static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("static count pattern is valid"));

/// Parses the first integer in an indicator text such as `"1,234 videos"`.
///
/// Thousands separators are ignored. Returns `None` when no digits are present.
#[must_use]
pub fn parse_count_text(text: &str) -> Option<u64> {
    let normalized: String = text.chars().filter(|c| *c != ',' && *c != '\u{a0}').collect();
    COUNT_PATTERN
        .find(&normalized)
        .and_then(|found| found.as_str().parse().ok())
}

/// Resolves the displayed count, falling back to the rendered item count.
///
/// Never fails: when every signal is missing the count is `0`.
pub(crate) async fn discover_displayed_count<B>(
    browser: &B,
    indicators: &[String],
    item_selector: &str,
    timeout: Duration,
) -> u64
where
    B: CountProvider + ItemPresenceProvider + ?Sized,
{
    match tokio::time::timeout(timeout, browser.displayed_count(indicators)).await {
        Ok(Ok(Some(count))) => {
            debug!(count, "displayed count resolved from indicator");
            return count;
        }
        Ok(Ok(None)) => debug!("no count indicator resolved"),
        Ok(Err(e)) => debug!(error = %e, "count indicator lookup failed"),
        Err(_) => debug!(timeout_ms = timeout.as_millis(), "count indicator lookup timed out"),
    }

    match browser.rendered_item_count(item_selector).await {
        Ok(count) => {
            debug!(count, "displayed count taken from rendered items");
            count
        }
        Err(e) => {
            warn!(error = %e, "could not determine displayed video count");
            0
        }
    }
}
