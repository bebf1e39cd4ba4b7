//! Request header composition for media fetches.

use reqwest::header::{
    ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_LENGTH, COOKIE, HOST,
    HeaderMap, HeaderName, HeaderValue, ORIGIN, RANGE, REFERER, USER_AGENT,
};
use tracing::debug;
use url::Url;

use super::constants::DEFAULT_ORIGIN;
use crate::session::SessionSnapshot;

/// Builds the headers of one request.
///
/// Layers, later ones win: the fixed baseline, the serialized cookie jar,
/// then the snapshot's header overrides. Overrides that are not valid header
/// names or values are skipped, and `Host`/`Content-Length` are never taken
/// from a capture.
pub(crate) fn compose_headers(
    user_agent: &str,
    referer: &str,
    snapshot: &SessionSnapshot,
) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert_str(&mut headers, USER_AGENT, user_agent);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers.insert(
        ACCEPT_ENCODING,
        HeaderValue::from_static("identity;q=1, *;q=0"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(RANGE, HeaderValue::from_static("bytes=0-"));
    insert_str(&mut headers, REFERER, referer);
    insert_str(&mut headers, ORIGIN, &origin_of(referer));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));

    if let Some(cookie_header) = snapshot.cookie_header() {
        insert_str(&mut headers, COOKIE, &cookie_header);
    }

    for (name, value) in snapshot.header_overrides() {
        let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
            debug!(header = %name, "skipping captured header with invalid name");
            continue;
        };
        if name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                headers.insert(name, value);
            }
            Err(_) => debug!(header = %name, "skipping captured header with invalid value"),
        }
    }

    headers
}

fn insert_str(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => debug!(header = %name, "skipping header with invalid value"),
    }
}

/// Scheme and host of `referer`, or the platform root when it has none.
fn origin_of(referer: &str) -> String {
    Url::parse(referer)
        .ok()
        .map(|url| url.origin())
        .filter(url::Origin::is_tuple)
        .map_or_else(|| DEFAULT_ORIGIN.to_string(), |origin| origin.ascii_serialization())
}
