//! Success and failure bookkeeping of one download run.

use std::collections::HashSet;

/// A candidate that is still failing, with the last error seen for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureEntry {
    /// Candidate id.
    pub candidate_id: String,
    /// 1-based position of the candidate in collection order.
    pub ordinal: usize,
    /// URL that was attempted.
    pub download_url: String,
    /// Message of the most recent failure.
    pub last_error: String,
}

/// Accumulated outcome of a run.
///
/// Ids move from the failure list into the success set, never back. The
/// success set, the failure list and the skipped list are disjoint.
#[derive(Debug, Clone, Default)]
pub struct DownloadReport {
    succeeded: Vec<String>,
    succeeded_ids: HashSet<String>,
    failures: Vec<FailureEntry>,
    skipped: Vec<String>,
}

impl DownloadReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `candidate_id` already succeeded.
    #[must_use]
    pub fn is_succeeded(&self, candidate_id: &str) -> bool {
        self.succeeded_ids.contains(candidate_id)
    }

    /// Records a success, removing any failure entry for the same id.
    ///
    /// Returns `false` if the id had already succeeded.
    pub fn record_success(&mut self, candidate_id: &str) -> bool {
        self.failures
            .retain(|failure| failure.candidate_id != candidate_id);
        if !self.succeeded_ids.insert(candidate_id.to_string()) {
            return false;
        }
        self.succeeded.push(candidate_id.to_string());
        true
    }

    /// Records or refreshes a failure.
    ///
    /// An existing entry for the same id is updated in place so the list keeps
    /// its original order. A failure for an id that already succeeded is
    /// ignored and `false` is returned.
    pub fn record_failure(&mut self, entry: FailureEntry) -> bool {
        if self.is_succeeded(&entry.candidate_id) {
            return false;
        }
        match self
            .failures
            .iter_mut()
            .find(|existing| existing.candidate_id == entry.candidate_id)
        {
            Some(existing) => *existing = entry,
            None => self.failures.push(entry),
        }
        true
    }

    /// Records a candidate skipped for lack of a download URL.
    pub fn record_skipped(&mut self, candidate_id: &str) {
        if !self.skipped.iter().any(|id| id == candidate_id) {
            self.skipped.push(candidate_id.to_string());
        }
    }

    /// Succeeded ids in the order they succeeded.
    #[must_use]
    pub fn succeeded(&self) -> &[String] {
        &self.succeeded
    }

    /// Remaining failures in the order they first failed.
    #[must_use]
    pub fn failures(&self) -> &[FailureEntry] {
        &self.failures
    }

    /// Ids skipped for lack of a download URL.
    #[must_use]
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    /// Whether every attempted candidate succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}
