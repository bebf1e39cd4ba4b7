//! Device identity sent with media requests.
//!
//! Media hosts reject requests that do not look like they come from the same
//! desktop browser that loaded the profile page, so the download baseline
//! carries a desktop Chrome identity rather than a tool identifier.

const DESKTOP_CHROME_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Default User-Agent for media download requests.
#[must_use]
pub(crate) fn default_device_user_agent() -> String {
    DESKTOP_CHROME_USER_AGENT.to_string()
}
