//! Progress reporting for streamed downloads.

use std::sync::Mutex;

use tracing::{debug, info};

/// Receives progress of the download currently streaming.
///
/// Downloads run one at a time, so an observer only ever tracks a single
/// transfer between `started` and `finished`.
pub trait ProgressObserver: Send + Sync {
    /// A response body starts streaming. `total_bytes` is the declared length.
    fn started(&self, label: &str, total_bytes: Option<u64>);

    /// `received` bytes have been written so far.
    fn advanced(&self, received: u64, total_bytes: Option<u64>);

    /// Streaming ended. `complete` is false when the attempt failed.
    fn finished(&self, received: u64, complete: bool);
}

/// Observer that reports through `tracing` at info level.
///
/// Emits one event per 10% step when the length is declared, otherwise one
/// per megabyte received.
#[derive(Debug, Default)]
pub struct LogProgress {
    last_step: Mutex<Option<u64>>,
}

impl LogProgress {
    /// Creates a logging observer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressObserver for LogProgress {
    fn started(&self, label: &str, total_bytes: Option<u64>) {
        if let Ok(mut last) = self.last_step.lock() {
            *last = None;
        }
        match total_bytes {
            Some(total) => info!("{label}: total size {:.2} MB", megabytes(total)),
            None => info!("{label}: total size unknown"),
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn advanced(&self, received: u64, total_bytes: Option<u64>) {
        let step = match completion_percent(received, total_bytes) {
            Some(percent) => (percent / 10.0).floor() as u64,
            None => megabytes(received).floor() as u64,
        };
        let Ok(mut last) = self.last_step.lock() else {
            return;
        };
        if *last != Some(step) {
            *last = Some(step);
            info!("downloading {}", progress_message(received, total_bytes));
        }
    }

    fn finished(&self, received: u64, complete: bool) {
        debug!(
            received_mb = megabytes(received),
            complete, "download stream finished"
        );
    }
}

/// `"42.0% (1.23 MB)"`, or just the megabytes when the total is unknown.
#[must_use]
pub fn progress_message(received: u64, total_bytes: Option<u64>) -> String {
    match completion_percent(received, total_bytes) {
        Some(percent) => format!("{percent:.1}% ({:.2} MB)", megabytes(received)),
        None => format!("{:.2} MB", megabytes(received)),
    }
}

/// Percentage of `total` received, when a non-zero total is known.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn completion_percent(received: u64, total: Option<u64>) -> Option<f64> {
    total
        .filter(|total| *total > 0)
        .map(|total| received as f64 / total as f64 * 100.0)
}

/// Bytes as (binary) megabytes.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
