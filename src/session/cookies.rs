//! Netscape cookie export parser.
//!
//! Parses the Netscape HTTP cookie file format (7 TAB-separated fields per
//! line) into [`SessionCookie`] values. Browsers and browser extensions can
//! export their jar in this format, which is how the replay browser seeds
//! its session.

use std::fmt;
use std::io::BufRead;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, instrument, warn};

/// A single cookie of the browser session.
///
/// The value is redacted in Debug output to prevent accidental logging of
/// session tokens.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    domain: String,
    name: String,
    value: String,
}

impl SessionCookie {
    /// Creates a cookie.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            value: value.into(),
        }
    }

    /// Domain the cookie belongs to (e.g. `.example.com`).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cookie value. Sensitive, never logged.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("domain", &self.domain)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Errors that can occur while parsing a cookie export.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A line in the cookie file has an invalid format.
    #[error("line {line_number}: {reason}")]
    InvalidLine {
        /// 1-based line number in the cookie file.
        line_number: usize,
        /// Description of what was wrong.
        reason: String,
    },

    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// No valid cookies found in a non-empty file.
    #[error("no valid cookies found in file ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Result of parsing a cookie export.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed, unexpired cookies.
    pub cookies: Vec<SessionCookie>,
    /// Warnings for malformed lines (line number and reason).
    pub warnings: Vec<(usize, String)>,
    /// Number of well-formed cookies dropped because they had expired.
    pub expired: usize,
}

/// Parses a Netscape-format cookie export from a buffered reader.
///
/// Lines starting with `#` (other than the `#HttpOnly_` domain prefix) and
/// blank lines are skipped. Cookies whose expiry lies in the past are dropped;
/// an expiry of `0` marks a session cookie and is kept.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when a non-empty file yields zero valid
/// lines. Individual malformed lines are collected as warnings.
#[instrument(level = "debug", skip(reader))]
pub fn parse_netscape_cookies(reader: impl BufRead) -> Result<ParseResult, CookieError> {
    let now = unix_now();
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();
    let mut expired = 0;
    let mut non_blank_lines = 0;

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end();

        if line.is_empty() {
            continue;
        }

        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.starts_with('#') => continue,
            None => line,
        };

        non_blank_lines += 1;

        match parse_cookie_line(line, line_number) {
            Ok((cookie, expires)) if expires != 0 && expires < now => {
                debug!(line = line_number, name = %cookie.name, "dropping expired cookie");
                expired += 1;
            }
            Ok((cookie, _)) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "parsed cookie"
                );
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() && expired == 0 && non_blank_lines > 0 {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParseResult {
        cookies,
        warnings,
        expired,
    })
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<(SessionCookie, u64), CookieError> {
    let fields: Vec<&str> = line.split('\t').collect();

    if fields.len() != 7 {
        return Err(CookieError::InvalidLine {
            line_number,
            reason: format!("expected 7 TAB-separated fields, found {}", fields.len()),
        });
    }

    let domain = fields[0];
    let expires = fields[4]
        .parse::<u64>()
        .map_err(|_| CookieError::InvalidLine {
            line_number,
            reason: format!(
                "expires field must be a non-negative integer, got '{}'",
                fields[4]
            ),
        })?;
    let name = fields[5];

    if domain.is_empty() {
        return Err(CookieError::InvalidLine {
            line_number,
            reason: "domain field is empty".to_string(),
        });
    }

    if name.is_empty() {
        return Err(CookieError::InvalidLine {
            line_number,
            reason: "cookie name field is empty".to_string(),
        });
    }

    Ok((SessionCookie::new(domain, name, fields[6]), expires))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
