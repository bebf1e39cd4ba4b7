//! Termination policy for infinite-scroll acquisition.

use std::fmt;

/// Why scrolling stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Page height did not change between two rounds; nothing more can load.
    EndOfPage,
    /// The rendered item count did not grow for the stability threshold.
    Stable,
    /// The hard cap on scroll rounds was reached.
    RoundCap,
    /// The browser stopped answering scroll or measurement commands.
    Interrupted,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::EndOfPage => "reached end of page",
            Self::Stable => "no new videos after multiple attempts",
            Self::RoundCap => "scroll round cap reached",
            Self::Interrupted => "browser stopped responding",
        };
        f.write_str(label)
    }
}

/// Tracks scroll rounds and decides when to stop.
///
/// Per round, in order: the no-growth streak is checked against the stability
/// threshold, then page height against the previous round, then the round cap.
/// A stable item count therefore stops acquisition even while the page keeps
/// reporting a growing height.
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    stability_threshold: u32,
    max_rounds: u32,
    rounds: u32,
    stalled_rounds: u32,
    previous_height: Option<u64>,
    previous_items: u64,
    max_items_seen: u64,
}

impl ScrollTracker {
    /// Creates a tracker. Both limits are clamped to at least 1.
    #[must_use]
    pub fn new(stability_threshold: u32, max_rounds: u32) -> Self {
        Self {
            stability_threshold: stability_threshold.max(1),
            max_rounds: max_rounds.max(1),
            rounds: 0,
            stalled_rounds: 0,
            previous_height: None,
            previous_items: 0,
            max_items_seen: 0,
        }
    }

    /// Records the measurements taken after a scroll settled.
    ///
    /// Returns the stop reason once acquisition should end.
    pub fn record_round(&mut self, page_height: u64, rendered_items: u64) -> Option<StopReason> {
        self.rounds += 1;
        self.max_items_seen = self.max_items_seen.max(rendered_items);

        if rendered_items <= self.previous_items {
            self.stalled_rounds += 1;
            if self.stalled_rounds >= self.stability_threshold {
                return Some(StopReason::Stable);
            }
        } else {
            self.stalled_rounds = 0;
        }

        if self.previous_height == Some(page_height) {
            return Some(StopReason::EndOfPage);
        }

        self.previous_height = Some(page_height);
        self.previous_items = rendered_items;

        if self.rounds >= self.max_rounds {
            return Some(StopReason::RoundCap);
        }
        None
    }

    /// Rounds recorded so far.
    #[must_use]
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Highest rendered item count observed in any round.
    #[must_use]
    pub fn max_items_seen(&self) -> u64 {
        self.max_items_seen
    }
}
