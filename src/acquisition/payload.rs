//! Lenient decoding of paginated item-list payloads.
//!
//! Only the fields needed to build a candidate are read. Items that do not
//! decode are skipped individually so one odd entry never drops a page.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::model::Rendition;

/// One decoded item of an `itemList` page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PayloadItem {
    pub(crate) id: String,
    pub(crate) author_handle: String,
    pub(crate) renditions: Vec<Rendition>,
}

#[derive(Debug, Deserialize)]
struct RawItem {
    id: Option<Value>,
    author: Option<RawAuthor>,
    video: Option<RawVideo>,
}

#[derive(Debug, Deserialize)]
struct RawAuthor {
    #[serde(rename = "uniqueId")]
    unique_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawVideo {
    #[serde(rename = "bitrateInfo", default)]
    bitrate_info: Vec<RawBitrate>,
}

#[derive(Debug, Deserialize)]
struct RawBitrate {
    #[serde(rename = "Bitrate", default)]
    bitrate: Option<f64>,
    #[serde(rename = "PlayAddr")]
    play_addr: Option<RawPlayAddr>,
}

#[derive(Debug, Deserialize)]
struct RawPlayAddr {
    #[serde(rename = "UrlList", default)]
    url_list: Vec<String>,
}

/// Extracts the items of a page. Pages without an `itemList` array yield nothing.
pub(crate) fn extract_items(payload: &Value) -> Vec<PayloadItem> {
    let Some(items) = payload.get("itemList").and_then(Value::as_array) else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|raw| match RawItem::deserialize(raw) {
            Ok(item) => decode_item(item),
            Err(e) => {
                debug!(error = %e, "skipping undecodable item");
                None
            }
        })
        .collect()
}

fn decode_item(item: RawItem) -> Option<PayloadItem> {
    let id = match item.id? {
        Value::String(id) if !id.is_empty() => id,
        Value::Number(id) => id.to_string(),
        _ => return None,
    };
    let author_handle = item.author?.unique_id?;
    let renditions = item
        .video
        .map(|video| {
            video
                .bitrate_info
                .into_iter()
                .map(|entry| {
                    Rendition::new(
                        bitrate_to_u64(entry.bitrate.unwrap_or(0.0)),
                        entry.play_addr.map(|addr| addr.url_list).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    Some(PayloadItem {
        id,
        author_handle,
        renditions,
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn bitrate_to_u64(bitrate: f64) -> u64 {
    if bitrate.is_finite() && bitrate > 0.0 {
        bitrate.round() as u64
    } else {
        0
    }
}
