//! Browser backend that plays back a captured profile session.
//!
//! A capture directory holds one JSON file per paginated API response, named
//! so that lexical order is arrival order (`page-000.json`, `page-001.json`,
//! ...). Navigation delivers the first page and every scroll delivers the
//! next one, mimicking infinite scroll. An optional `indicators.json` maps
//! count-indicator selectors to their rendered text.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use super::{BrowserError, CountProvider, ItemPresenceProvider, PageDriver, SessionSource};
use crate::acquisition::parse_count_text;
use crate::session::{SessionCookie, SessionSnapshot, parse_netscape_cookies};

/// URL reported for every replayed response, matched against subscription filters.
pub const CAPTURED_RESPONSE_URL: &str = "https://replay.invalid/api/post/item_list/";

/// Name of the optional indicator map inside a capture directory.
const INDICATORS_FILE: &str = "indicators.json";

/// Height of the page before any content is loaded.
const BASE_PAGE_HEIGHT: u64 = 1_080;

/// Height added by each delivered page of results.
const PAGE_HEIGHT_STEP: u64 = 2_400;

#[derive(Debug, Default)]
struct ReplayState {
    navigated: bool,
    delivered: usize,
    subscribers: Vec<(String, mpsc::UnboundedSender<Value>)>,
}

/// Plays back captured responses, cookies and headers.
#[derive(Debug)]
pub struct ReplayBrowser {
    pages: Vec<Value>,
    cookies: Vec<SessionCookie>,
    headers: Vec<(String, String)>,
    indicators: HashMap<String, String>,
    state: Mutex<ReplayState>,
}

impl ReplayBrowser {
    /// Creates a replay over in-memory pages.
    #[must_use]
    pub fn new(pages: Vec<Value>) -> Self {
        Self {
            pages,
            cookies: Vec::new(),
            headers: Vec::new(),
            indicators: HashMap::new(),
            state: Mutex::new(ReplayState::default()),
        }
    }

    /// Sets the cookie jar returned by every snapshot.
    #[must_use]
    pub fn with_cookies(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Sets the intercepted request headers returned by every snapshot.
    #[must_use]
    pub fn with_headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = headers;
        self
    }

    /// Sets the rendered text of a count indicator.
    #[must_use]
    pub fn with_indicator(mut self, selector: impl Into<String>, text: impl Into<String>) -> Self {
        self.indicators.insert(selector.into(), text.into());
        self
    }

    /// Loads a capture directory plus optional cookie export and header capture.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError::CaptureIo`] when a file cannot be read,
    /// [`BrowserError::MalformedCapture`] when a page or the header capture is
    /// not the expected JSON, and [`BrowserError::Cookies`] when the cookie
    /// export is unusable.
    #[instrument(level = "debug")]
    pub fn from_capture_dir(
        capture_dir: &Path,
        cookies_file: Option<&Path>,
        headers_file: Option<&Path>,
    ) -> Result<Self, BrowserError> {
        let mut page_paths = Vec::new();
        let entries = std::fs::read_dir(capture_dir).map_err(|source| BrowserError::CaptureIo {
            path: capture_dir.to_path_buf(),
            source,
        })?;
        for entry in entries {
            let entry = entry.map_err(|source| BrowserError::CaptureIo {
                path: capture_dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            let is_json = path.extension().is_some_and(|ext| ext == "json");
            let is_indicators = path.file_name().is_some_and(|name| name == INDICATORS_FILE);
            if is_json && !is_indicators {
                page_paths.push(path);
            }
        }
        page_paths.sort();

        let mut pages = Vec::with_capacity(page_paths.len());
        for path in &page_paths {
            pages.push(read_json(path)?);
        }

        let mut browser = Self::new(pages);

        let indicators_path = capture_dir.join(INDICATORS_FILE);
        if indicators_path.exists() {
            browser.indicators = read_string_map(&indicators_path)?.into_iter().collect();
        }

        if let Some(path) = cookies_file {
            let file = std::fs::File::open(path).map_err(|source| BrowserError::CaptureIo {
                path: path.to_path_buf(),
                source,
            })?;
            let parsed = parse_netscape_cookies(std::io::BufReader::new(file))?;
            for (line, reason) in &parsed.warnings {
                warn!(line, reason = %reason, "skipping malformed cookie line");
            }
            browser.cookies = parsed.cookies;
        }

        if let Some(path) = headers_file {
            browser.headers = read_string_map(path)?;
        }

        info!(
            pages = browser.pages.len(),
            cookies = browser.cookies.len(),
            headers = browser.headers.len(),
            "loaded captured session"
        );
        Ok(browser)
    }

    /// Number of captured pages.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Delivers the next undelivered page to matching subscribers.
    fn deliver_next(&self, state: &mut ReplayState) {
        let Some(page) = self.pages.get(state.delivered) else {
            debug!(delivered = state.delivered, "no more captured pages");
            return;
        };
        state.delivered += 1;
        state.subscribers.retain(|(filter, sender)| {
            if !CAPTURED_RESPONSE_URL.contains(filter.as_str()) {
                return true;
            }
            sender.send(page.clone()).is_ok()
        });
        debug!(page = state.delivered, "delivered captured page");
    }
}

#[async_trait]
impl PageDriver for ReplayBrowser {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
        url::Url::parse(url).map_err(|e| BrowserError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        let mut state = self.lock_state();
        if !state.navigated {
            state.navigated = true;
            self.deliver_next(&mut state);
        }
        Ok(())
    }

    fn subscribe_responses(&self, url_filter: &str) -> mpsc::UnboundedReceiver<Value> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock_state()
            .subscribers
            .push((url_filter.to_string(), sender));
        receiver
    }

    async fn scroll_to_end(&self) -> Result<(), BrowserError> {
        let mut state = self.lock_state();
        if !state.navigated {
            return Err(BrowserError::Evaluation(
                "cannot scroll before the page is loaded".to_string(),
            ));
        }
        self.deliver_next(&mut state);
        Ok(())
    }

    async fn page_height(&self) -> Result<u64, BrowserError> {
        let delivered = self.lock_state().delivered as u64;
        Ok(BASE_PAGE_HEIGHT + delivered * PAGE_HEIGHT_STEP)
    }
}

#[async_trait]
impl CountProvider for ReplayBrowser {
    async fn displayed_count(&self, indicators: &[String]) -> Result<Option<u64>, BrowserError> {
        Ok(indicators
            .iter()
            .filter_map(|selector| self.indicators.get(selector))
            .filter_map(|text| parse_count_text(text))
            .find(|count| *count > 0))
    }
}

#[async_trait]
impl ItemPresenceProvider for ReplayBrowser {
    async fn rendered_item_count(&self, _item_selector: &str) -> Result<u64, BrowserError> {
        let delivered = self.lock_state().delivered;
        Ok(self.pages[..delivered]
            .iter()
            .map(|page| {
                page.get("itemList")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len) as u64
            })
            .sum())
    }
}

#[async_trait]
impl SessionSource for ReplayBrowser {
    async fn snapshot(&self) -> Result<SessionSnapshot, BrowserError> {
        Ok(SessionSnapshot::new(self.cookies.clone(), self.headers.clone()))
    }
}

fn read_json(path: &Path) -> Result<Value, BrowserError> {
    let raw = std::fs::read_to_string(path).map_err(|source| BrowserError::CaptureIo {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|e| BrowserError::MalformedCapture {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Reads a flat JSON object of string values.
fn read_string_map(path: &Path) -> Result<Vec<(String, String)>, BrowserError> {
    let malformed = |reason: &str| BrowserError::MalformedCapture {
        path: PathBuf::from(path),
        reason: reason.to_string(),
    };
    let Value::Object(map) = read_json(path)? else {
        return Err(malformed("expected a JSON object"));
    };
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            _ => Err(malformed(&format!("value of `{key}` is not a string"))),
        })
        .collect()
}
