use std::collections::HashSet;

use serde_json::Value;
use tracing::debug;

use super::payload::extract_items;
use crate::model::Candidate;

/// Accumulates candidates from intercepted item-list payloads.
///
/// Keeps items published by the target profile, drops ids it has already
/// seen, and preserves arrival order. Every raw payload is retained for the
/// run report, including ones that contributed nothing.
#[derive(Debug)]
pub struct AcquisitionCollector {
    target_handle: String,
    seen: HashSet<String>,
    candidates: Vec<Candidate>,
    raw_payloads: Vec<Value>,
}

impl AcquisitionCollector {
    /// Creates a collector for the profile `target_handle` (without `@`).
    #[must_use]
    pub fn new(target_handle: impl Into<String>) -> Self {
        Self {
            target_handle: target_handle.into(),
            seen: HashSet::new(),
            candidates: Vec::new(),
            raw_payloads: Vec::new(),
        }
    }

    /// Handle whose items are kept.
    #[must_use]
    pub fn target_handle(&self) -> &str {
        &self.target_handle
    }

    /// Ingests one intercepted payload, returning how many new candidates it added.
    pub fn observe(&mut self, payload: Value) -> usize {
        let mut added = 0;
        for item in extract_items(&payload) {
            if item.author_handle != self.target_handle {
                continue;
            }
            if !self.seen.insert(item.id.clone()) {
                continue;
            }
            let ordinal = self.candidates.len() + 1;
            self.candidates.push(Candidate::new(
                item.id,
                item.author_handle,
                ordinal,
                item.renditions,
            ));
            added += 1;
        }
        self.raw_payloads.push(payload);
        debug!(
            added,
            total = self.candidates.len(),
            payloads = self.raw_payloads.len(),
            "observed payload"
        );
        added
    }

    /// Candidates in arrival order.
    #[must_use]
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Raw payloads in arrival order.
    #[must_use]
    pub fn raw_payloads(&self) -> &[Value] {
        &self.raw_payloads
    }

    /// Freezes the collector into its candidates and raw payloads.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Candidate>, Vec<Value>) {
        (self.candidates, self.raw_payloads)
    }
}
