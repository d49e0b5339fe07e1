//! Pipeline outcome bookkeeping for status queries

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::TransferOutcome;

/// Last outcome together with when it was recorded
#[derive(Debug, Clone, Serialize)]
pub struct RecordedOutcome {
    pub outcome: TransferOutcome,
    pub finished_at: DateTime<Utc>,
}

/// Point-in-time copy of the tracker counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerSnapshot {
    pub last: Option<RecordedOutcome>,
    pub succeeded: u64,
    pub failed: u64,
    pub in_flight: u64,
}

/// Counts transfers and remembers the most recent outcome
///
/// Written by the pipeline, read by the status reporter. Reads never block
/// writers for longer than a clone.
#[derive(Debug, Default)]
pub struct OutcomeTracker {
    last: Mutex<Option<RecordedOutcome>>,
    succeeded: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
}

impl OutcomeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a transfer as started; the guard marks it finished on drop
    pub fn begin(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { tracker: self }
    }

    pub fn record(&self, outcome: &TransferOutcome) {
        if outcome.is_success() {
            self.succeeded.fetch_add(1, Ordering::SeqCst);
        } else {
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(RecordedOutcome {
            outcome: outcome.clone(),
            finished_at: Utc::now(),
        });
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            last: self.last.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            succeeded: self.succeeded.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            in_flight: self.in_flight.load(Ordering::SeqCst),
        }
    }
}

/// Decrements the in-flight counter when dropped
pub struct InFlightGuard<'a> {
    tracker: &'a OutcomeTracker,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.tracker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
