//! Rate limiting for visibility edges.
//!
//! Fast scrolling makes the observer fire many times per frame.  Edges are
//! collected here and handed to the controller as one batch at most once per
//! interval.  Time is passed in as a `Duration` since page origin because
//! `std::time::Instant` is not available on `wasm32-unknown-unknown`.

use std::time::Duration;

use crate::tile::VisibilityChange;

#[derive(Debug, Clone)]
pub struct VisibilityBatcher {
    interval: Duration,
    last_flush: Option<Duration>,
    pending: Vec<VisibilityChange>,
}

impl VisibilityBatcher {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_flush: None,
            pending: Vec::new(),
        }
    }

    pub fn push(&mut self, change: VisibilityChange) {
        self.pending.push(change);
    }

    pub fn extend<I: IntoIterator<Item = VisibilityChange>>(&mut self, changes: I) {
        self.pending.extend(changes);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// How long until a flush is allowed.  `None` when nothing is pending,
    /// `Some(ZERO)` when [`take_due`](Self::take_due) would succeed now.
    pub fn next_due(&self, now: Duration) -> Option<Duration> {
        if self.pending.is_empty() {
            return None;
        }
        match self.last_flush {
            None => Some(Duration::ZERO),
            Some(last) => {
                let ready_at = last + self.interval;
                Some(ready_at.saturating_sub(now))
            }
        }
    }

    /// Take the pending edges if the interval since the last flush elapsed.
    /// Edges keep the order in which they were pushed.
    pub fn take_due(&mut self, now: Duration) -> Option<Vec<VisibilityChange>> {
        if self.next_due(now)? > Duration::ZERO {
            return None;
        }
        self.last_flush = Some(now);
        Some(std::mem::take(&mut self.pending))
    }

    /// Drop everything pending (teardown).
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
