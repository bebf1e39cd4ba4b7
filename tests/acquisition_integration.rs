//! Integration tests for scroll-driven acquisition.
//!
//! A synthetic browser scripts page height, rendered items and failures per
//! scroll; the replay browser covers the captured-session path.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use harvester_core::{
    AcquisitionConfig, AcquisitionError, BrowserError, CountProvider, ItemPresenceProvider,
    PageDriver, ReplayBrowser, StopReason, acquire,
};
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::mpsc;

mod support;
use support::item_list_page;

const PROFILE: &str = "https://www.tiktok.com/@someone";

fn fast_config() -> AcquisitionConfig {
    AcquisitionConfig {
        settle_delay: Duration::ZERO,
        grace_delay: Duration::ZERO,
        count_timeout: Duration::from_millis(50),
        ..AcquisitionConfig::default()
    }
}

/// Browser whose measurements grow linearly with the number of scrolls.
#[derive(Default)]
struct SyntheticBrowser {
    height_step: u64,
    items_step: u64,
    base_items: u64,
    fail_navigation: bool,
    slow_count: bool,
    displayed: Option<u64>,
    fail_scroll_after: Option<u64>,
    scrolls: AtomicU64,
    navigations: AtomicUsize,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Value>>>,
}

impl SyntheticBrowser {
    fn publish(&self, page: Value) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|sender| sender.send(page.clone()).is_ok());
    }
}

#[async_trait]
impl PageDriver for SyntheticBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        self.navigations.fetch_add(1, Ordering::SeqCst);
        if self.fail_navigation {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        self.publish(item_list_page(&[("nav", "someone", "https://cdn.example/nav.mp4")]));
        Ok(())
    }

    fn subscribe_responses(&self, _url_filter: &str) -> mpsc::UnboundedReceiver<Value> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(sender);
        receiver
    }

    async fn scroll_to_end(&self) -> Result<(), BrowserError> {
        let scroll = self.scrolls.load(Ordering::SeqCst) + 1;
        if self.fail_scroll_after.is_some_and(|limit| scroll > limit) {
            return Err(BrowserError::Unavailable("target closed".to_string()));
        }
        self.scrolls.store(scroll, Ordering::SeqCst);
        let id = format!("s{scroll}");
        let url = format!("https://cdn.example/{id}.mp4");
        self.publish(item_list_page(&[(id.as_str(), "someone", url.as_str())]));
        Ok(())
    }

    async fn page_height(&self) -> Result<u64, BrowserError> {
        Ok(1_000 + self.scrolls.load(Ordering::SeqCst) * self.height_step)
    }
}

#[async_trait]
impl CountProvider for SyntheticBrowser {
    async fn displayed_count(&self, _indicators: &[String]) -> Result<Option<u64>, BrowserError> {
        if self.slow_count {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        Ok(self.displayed)
    }
}

#[async_trait]
impl ItemPresenceProvider for SyntheticBrowser {
    async fn rendered_item_count(&self, _item_selector: &str) -> Result<u64, BrowserError> {
        Ok(self.base_items + self.scrolls.load(Ordering::SeqCst) * self.items_step)
    }
}

#[tokio::test]
async fn test_stable_item_count_stops_while_height_keeps_growing() {
    let browser = SyntheticBrowser {
        height_step: 500,
        items_step: 0,
        base_items: 10,
        displayed: Some(10),
        ..SyntheticBrowser::default()
    };

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();

    assert_eq!(acquisition.stop_reason, StopReason::Stable);
    // One growth round, then three rounds without new items.
    assert_eq!(acquisition.rounds, 4);
    assert_eq!(acquisition.displayed_count, 10);
}

#[tokio::test]
async fn test_round_cap_bounds_endless_growth() {
    let browser = SyntheticBrowser {
        height_step: 500,
        items_step: 12,
        ..SyntheticBrowser::default()
    };
    let config = AcquisitionConfig {
        max_scroll_rounds: 5,
        ..fast_config()
    };

    let acquisition = acquire(&browser, PROFILE, &config).await.unwrap();

    assert_eq!(acquisition.stop_reason, StopReason::RoundCap);
    assert_eq!(acquisition.rounds, 5);
    // The navigation page plus one page per scroll.
    assert_eq!(acquisition.candidates.len(), 6);
    assert_eq!(acquisition.estimated_total, 60);
}

#[tokio::test]
async fn test_unchanged_height_ends_at_end_of_page() {
    let browser = SyntheticBrowser {
        height_step: 0,
        items_step: 3,
        ..SyntheticBrowser::default()
    };

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();

    assert_eq!(acquisition.stop_reason, StopReason::EndOfPage);
    assert_eq!(acquisition.rounds, 2);
}

#[tokio::test]
async fn test_slow_count_indicator_falls_back_to_rendered_items() {
    let browser = SyntheticBrowser {
        height_step: 0,
        base_items: 7,
        slow_count: true,
        displayed: Some(999),
        ..SyntheticBrowser::default()
    };

    let acquisition = tokio::time::timeout(
        Duration::from_secs(5),
        acquire(&browser, PROFILE, &fast_config()),
    )
    .await
    .expect("count discovery must be bounded")
    .unwrap();

    assert_eq!(acquisition.displayed_count, 7);
}

#[tokio::test]
async fn test_missing_count_signals_give_zero_estimate() {
    let browser = SyntheticBrowser {
        height_step: 0,
        ..SyntheticBrowser::default()
    };

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();

    assert_eq!(acquisition.displayed_count, 0);
    assert_eq!(acquisition.estimated_total, 0);
    // Nothing renders, so the height check ends the run on the second round.
    assert_eq!(acquisition.stop_reason, StopReason::EndOfPage);
    assert_eq!(acquisition.candidates.len(), 3);
}

#[tokio::test]
async fn test_navigation_failure_is_fatal() {
    let browser = SyntheticBrowser {
        fail_navigation: true,
        ..SyntheticBrowser::default()
    };

    let result = acquire(&browser, PROFILE, &fast_config()).await;

    assert!(matches!(
        result,
        Err(AcquisitionError::Startup(BrowserError::Navigation { .. }))
    ));
}

#[tokio::test]
async fn test_invalid_profile_url_never_navigates() {
    let browser = SyntheticBrowser::default();

    let result = acquire(&browser, "https://www.tiktok.com/explore", &fast_config()).await;

    assert!(matches!(
        result,
        Err(AcquisitionError::InvalidProfileUrl { .. })
    ));
    assert_eq!(browser.navigations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_scroll_failure_keeps_collected_candidates() {
    let browser = SyntheticBrowser {
        height_step: 500,
        items_step: 1,
        fail_scroll_after: Some(2),
        ..SyntheticBrowser::default()
    };

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();

    assert_eq!(acquisition.stop_reason, StopReason::Interrupted);
    let ids: Vec<&str> = acquisition.candidates.iter().map(|c| c.id()).collect();
    assert_eq!(ids, ["nav", "s1", "s2"]);
}

#[tokio::test]
async fn test_replayed_capture_dedups_and_filters_foreign_items() {
    let pages = vec![
        item_list_page(&[
            ("1", "someone", "https://cdn.example/1.mp4"),
            ("2", "someone", "https://cdn.example/2.mp4"),
        ]),
        item_list_page(&[
            ("2", "someone", "https://cdn.example/2-again.mp4"),
            ("3", "someone_else", "https://cdn.example/3.mp4"),
        ]),
        item_list_page(&[("4", "someone", "https://cdn.example/4.mp4")]),
    ];
    let browser = ReplayBrowser::new(pages).with_indicator(".video-count strong", "3 videos");

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();

    assert_eq!(acquisition.profile_handle, "someone");
    assert_eq!(acquisition.stop_reason, StopReason::EndOfPage);
    assert_eq!(acquisition.raw_payloads.len(), 3);
    assert_eq!(acquisition.displayed_count, 3);
    // Rendered item count peaks at 5 (duplicates render twice).
    assert_eq!(acquisition.estimated_total, 5);

    let collected: Vec<(&str, usize, Option<&str>)> = acquisition
        .candidates
        .iter()
        .map(|c| (c.id(), c.ordinal(), c.download_url()))
        .collect();
    assert_eq!(
        collected,
        [
            ("1", 1, Some("https://cdn.example/1.mp4")),
            ("2", 2, Some("https://cdn.example/2.mp4")),
            ("4", 3, Some("https://cdn.example/4.mp4")),
        ]
    );
}

#[tokio::test]
async fn test_replay_browser_loads_capture_directory() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("page-000.json"),
        item_list_page(&[("10", "someone", "https://cdn.example/10.mp4")]).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("page-001.json"),
        item_list_page(&[("11", "someone", "https://cdn.example/11.mp4")]).to_string(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("indicators.json"),
        r#"{"[data-e2e=\"user-post-count\"]": "2"}"#,
    )
    .unwrap();
    let cookies = dir.path().join("cookies.txt");
    std::fs::write(
        &cookies,
        "# Netscape HTTP Cookie File\n.tiktok.com\tTRUE\t/\tTRUE\t0\tmsToken\tabc\n",
    )
    .unwrap();

    let browser = ReplayBrowser::from_capture_dir(dir.path(), Some(&cookies), None).unwrap();
    assert_eq!(browser.page_count(), 2);

    let acquisition = acquire(&browser, PROFILE, &fast_config()).await.unwrap();
    let ids: Vec<&str> = acquisition.candidates.iter().map(|c| c.id()).collect();
    assert_eq!(ids, ["10", "11"]);
    assert_eq!(acquisition.displayed_count, 2);
}
