//! Session state captured from the browser before each download attempt.
//!
//! Media URLs are only honoured when the request carries the cookies and
//! anti-bot tokens of the browser session that discovered them. Those tokens
//! rotate per request, so a [`SessionSnapshot`] is taken fresh before every
//! attempt and is read-only to the download engine.

mod cookies;

pub use cookies::{CookieError, ParseResult, SessionCookie, parse_netscape_cookies};

/// Cookies mirrored into request headers of the same (or a normalized) name.
///
/// Each entry is `(cookie name, header name)`.
pub const TOKEN_COOKIE_HEADERS: [(&str, &str); 4] = [
    ("msToken", "msToken"),
    ("tt_chain_token", "tt_chain_token"),
    ("tt_csrf_token", "tt-csrf-token"),
    ("ttwid", "ttwid"),
];

/// Cookie jar and outgoing header set of the browser session at one instant.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    cookies: Vec<SessionCookie>,
    headers: Vec<(String, String)>,
}

impl SessionSnapshot {
    /// Creates a snapshot from cookies and the latest intercepted request headers.
    #[must_use]
    pub fn new(cookies: Vec<SessionCookie>, headers: Vec<(String, String)>) -> Self {
        Self { cookies, headers }
    }

    /// Cookies in jar order.
    #[must_use]
    pub fn cookies(&self) -> &[SessionCookie] {
        &self.cookies
    }

    /// Latest intercepted request headers, in capture order.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Serializes the jar as a `Cookie` header value (`a=1; b=2`).
    ///
    /// Returns `None` for an empty jar.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name(), cookie.value()))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Looks up a cookie value by exact name.
    #[must_use]
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|cookie| cookie.name() == name)
            .map(SessionCookie::value)
    }

    /// Header overrides for a media request: captured headers followed by the
    /// anti-bot token headers. Later entries win when names collide.
    #[must_use]
    pub fn header_overrides(&self) -> Vec<(String, String)> {
        let mut overrides = self.headers.clone();
        for (cookie_name, header_name) in TOKEN_COOKIE_HEADERS {
            if let Some(value) = self.cookie_value(cookie_name) {
                overrides.push((header_name.to_string(), value.to_string()));
            }
        }
        overrides
    }
}
