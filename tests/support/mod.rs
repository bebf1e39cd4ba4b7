#![allow(dead_code)]

pub mod socket_guard;

use serde_json::{Value, json};

/// Body large enough to pass the artifact size floor.
pub const VIDEO_BYTES: usize = 150_000;

pub fn video_body() -> Vec<u8> {
    vec![0x42; VIDEO_BYTES]
}

/// One item-list page with items `(id, author, url)`.
pub fn item_list_page(items: &[(&str, &str, &str)]) -> Value {
    let items: Vec<Value> = items
        .iter()
        .map(|(id, author, url)| {
            json!({
                "id": id,
                "author": {"uniqueId": author},
                "video": {
                    "bitrateInfo": [
                        {"Bitrate": 800_000, "PlayAddr": {"UrlList": [url]}}
                    ]
                }
            })
        })
        .collect();
    json!({ "itemList": items, "hasMore": true })
}
