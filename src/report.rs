//! JSON report written at the end of a run.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::info;

use crate::orchestrator::{DownloadReport, FailureEntry};

/// Errors writing the run report.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report could not be serialized.
    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The report file could not be written.
    #[error("failed to write report to {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

/// One unrecovered failure as it appears in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDownload {
    /// 1-based position of the video in collection order.
    pub video_counter: usize,
    /// Platform id of the video.
    pub video_id: String,
    /// URL that was attempted.
    pub video_url: String,
    /// Last error message.
    pub error: String,
}

impl From<&FailureEntry> for FailedDownload {
    fn from(entry: &FailureEntry) -> Self {
        Self {
            video_counter: entry.ordinal,
            video_id: entry.candidate_id.clone(),
            video_url: entry.download_url.clone(),
            error: entry.last_error.clone(),
        }
    }
}

/// Everything a run collected and how its downloads ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// Every intercepted item-list payload, in arrival order.
    pub responses: Vec<Value>,
    /// Unrecovered failures.
    pub failed_downloads: Vec<FailedDownload>,
    /// Ids that were downloaded.
    pub successful_downloads: Vec<String>,
    /// Ids skipped for lack of a download URL.
    pub skipped_downloads: Vec<String>,
    /// Best available estimate of the profile's video count.
    pub estimated_total: u64,
}

impl RunReport {
    /// Assembles the report from the raw payloads and the download outcome.
    #[must_use]
    pub fn new(responses: Vec<Value>, estimated_total: u64, downloads: &DownloadReport) -> Self {
        Self {
            responses,
            failed_downloads: downloads.failures().iter().map(FailedDownload::from).collect(),
            successful_downloads: downloads.succeeded().to_vec(),
            skipped_downloads: downloads.skipped().to_vec(),
            estimated_total,
        }
    }

    /// Writes the report as pretty-printed JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError`] if serialization or any file operation fails.
    pub async fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let json = serde_json::to_string_pretty(self)?;
        let io_error = |source| ReportError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }
        tokio::fs::write(path, json).await.map_err(io_error)?;
        info!(path = %path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_downloads() -> DownloadReport {
        let mut downloads = DownloadReport::new();
        downloads.record_success("1");
        downloads.record_failure(FailureEntry {
            candidate_id: "2".to_string(),
            ordinal: 2,
            download_url: "https://cdn/2".to_string(),
            last_error: "HTTP 503 downloading https://cdn/2".to_string(),
        });
        downloads.record_skipped("3");
        downloads
    }

    #[test]
    fn test_report_json_shape() {
        let report = RunReport::new(vec![json!({"itemList": []})], 3, &sample_downloads());
        let value = serde_json::to_value(&report).unwrap();

        assert_eq!(value["responses"], json!([{"itemList": []}]));
        assert_eq!(value["successfulDownloads"], json!(["1"]));
        assert_eq!(value["skippedDownloads"], json!(["3"]));
        assert_eq!(value["estimatedTotal"], json!(3));
        assert_eq!(
            value["failedDownloads"],
            json!([{
                "videoCounter": 2,
                "videoId": "2",
                "videoUrl": "https://cdn/2",
                "error": "HTTP 503 downloading https://cdn/2"
            }])
        );
    }

    #[tokio::test]
    async fn test_write_to_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = RunReport::new(Vec::new(), 0, &DownloadReport::new());

        report.write_to(&path).await.unwrap();

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["failedDownloads"], json!([]));
    }

    #[tokio::test]
    async fn test_write_to_unwritable_path_is_io_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let report = RunReport::new(Vec::new(), 0, &DownloadReport::new());

        let result = report.write_to(&blocker.join("report.json")).await;
        assert!(matches!(result, Err(ReportError::Io { .. })));
    }
}
