//! Candidate videos collected from a profile.

use serde::Serialize;

/// One encoded-quality variant of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rendition {
    /// Reported bitrate; higher is better quality.
    pub bitrate: u64,
    /// Playback URLs in the order the platform listed them.
    pub url_candidates: Vec<String>,
}

impl Rendition {
    /// Creates a rendition.
    #[must_use]
    pub fn new(bitrate: u64, url_candidates: Vec<String>) -> Self {
        Self {
            bitrate,
            url_candidates,
        }
    }
}

/// A deduplicated video record eligible for download.
///
/// Renditions are attached at construction and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    id: String,
    author_handle: String,
    ordinal: usize,
    renditions: Vec<Rendition>,
}

impl Candidate {
    /// Creates a candidate.
    ///
    /// `ordinal` is the 1-based position of the candidate in collection order.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        author_handle: impl Into<String>,
        ordinal: usize,
        renditions: Vec<Rendition>,
    ) -> Self {
        Self {
            id: id.into(),
            author_handle: author_handle.into(),
            ordinal,
            renditions,
        }
    }

    /// Platform id of the video.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Handle of the publishing profile.
    #[must_use]
    pub fn author_handle(&self) -> &str {
        &self.author_handle
    }

    /// 1-based position in collection order.
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Renditions in payload order.
    #[must_use]
    pub fn renditions(&self) -> &[Rendition] {
        &self.renditions
    }

    /// First URL of the highest-bitrate rendition.
    ///
    /// When several renditions share the highest bitrate, the one listed first
    /// wins. Returns `None` when there are no renditions or the winning
    /// rendition has no non-empty URL.
    #[must_use]
    pub fn download_url(&self) -> Option<&str> {
        let best = self
            .renditions
            .iter()
            .fold(None::<&Rendition>, |best, rendition| match best {
                Some(current) if current.bitrate >= rendition.bitrate => Some(current),
                _ => Some(rendition),
            })?;

        best.url_candidates
            .first()
            .map(String::as_str)
            .filter(|url| !url.is_empty())
    }
}
