//! Status reporting use case
//!
//! Answers "is the relay working?" by checking the share on demand and
//! summarizing what the pipeline has done so far. Never mutates pipeline
//! state and is safe to run while transfers are in flight.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use super::share_client::{RemoteShareClient, ShareHealth};
use super::tracker::{OutcomeTracker, RecordedOutcome};

/// Static description of the configured share, shown in status replies
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShareSummary {
    pub endpoint: String,
    pub server: String,
    pub share: String,
    pub server_name: Option<String>,
    pub backup_directory: String,
}

/// Answer to a status query
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub bot_alive: bool,
    pub share_status: ShareHealth,
    pub last_transfer_outcome: Option<RecordedOutcome>,
    pub transfers_succeeded: u64,
    pub transfers_failed: u64,
    pub transfers_in_flight: u64,
    pub share: ShareSummary,
    pub checked_at: DateTime<Utc>,
}

/// Builds [`StatusReport`]s
pub struct StatusReporter {
    share: Arc<RemoteShareClient>,
    tracker: Arc<OutcomeTracker>,
    summary: ShareSummary,
}

impl StatusReporter {
    pub fn new(
        share: Arc<RemoteShareClient>,
        tracker: Arc<OutcomeTracker>,
        summary: ShareSummary,
    ) -> Self {
        Self {
            share,
            tracker,
            summary,
        }
    }

    pub async fn report(&self) -> StatusReport {
        let share_status = self.share.health_check().await;
        let snapshot = self.tracker.snapshot();
        debug!(?share_status, in_flight = snapshot.in_flight, "Status report built");

        StatusReport {
            bot_alive: true,
            share_status,
            last_transfer_outcome: snapshot.last,
            transfers_succeeded: snapshot.succeeded,
            transfers_failed: snapshot.failed,
            transfers_in_flight: snapshot.in_flight,
            share: self.summary.clone(),
            checked_at: Utc::now(),
        }
    }
}
