//! Sync queue entries and their status state machine.
//!
//! Entries are produced by catalog management whenever a pack changes and
//! consumed by the engine. Transitions:
//!
//! `Pending -> Processing -> {Completed | Pending (attempts < max) | Failed}`
//!
//! `Completed` and `Failed` (retries exhausted) are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use packsync_core::{DomainError, PackId, QueueEntryId};

/// Retry cap: an entry that has started this many attempts and still fails
/// becomes terminally `Failed`.
pub const MAX_ATTEMPTS: i32 = 3;

/// Sync queue entry status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Queued, waiting to be picked up (initial state, and the retry state).
    Pending,
    /// Claimed by a processor; a crash leaves the row stuck here.
    Processing,
    /// Synced successfully.
    Completed,
    /// Retries exhausted; excluded from automatic processing.
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Processing => "processing",
            QueueStatus::Completed => "completed",
            QueueStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, DomainError> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "processing" => Ok(QueueStatus::Processing),
            "completed" => Ok(QueueStatus::Completed),
            "failed" => Ok(QueueStatus::Failed),
            other => Err(DomainError::validation(format!(
                "unknown queue status: {other}"
            ))),
        }
    }
}

/// One row of the durable sync queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueEntry {
    pub id: QueueEntryId,
    pub pack_id: PackId,
    pub status: QueueStatus,
    /// Attempts started so far (incremented on claim, before the work runs).
    pub attempts: i32,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl SyncQueueEntry {
    pub fn new(pack_id: PackId) -> Self {
        Self {
            id: QueueEntryId::new(),
            pack_id,
            status: QueueStatus::Pending,
            attempts: 0,
            error_message: None,
            created_at: Utc::now(),
            processed_at: None,
        }
    }

    /// Whether a processor may claim this entry.
    ///
    /// `Failed` entries below the attempt cap are still eligible: the status
    /// records the last outcome, the cap decides eligibility.
    pub fn is_eligible(&self) -> bool {
        matches!(self.status, QueueStatus::Pending | QueueStatus::Failed)
            && self.attempts < MAX_ATTEMPTS
    }

    /// Claim the entry: increment `attempts` and move to `Processing`.
    ///
    /// The increment happens before any work so that a crash mid-sync is
    /// observable as a stuck `Processing` row rather than silently lost.
    pub fn claim(&mut self) -> Result<(), DomainError> {
        if !self.is_eligible() {
            return Err(DomainError::illegal_transition(format!(
                "entry {} is not eligible (status {}, attempts {})",
                self.id,
                self.status.as_str(),
                self.attempts
            )));
        }
        self.status = QueueStatus::Processing;
        self.attempts += 1;
        Ok(())
    }

    /// Record a successful sync.
    pub fn complete(&mut self, at: DateTime<Utc>) {
        self.status = QueueStatus::Completed;
        self.processed_at = Some(at);
        self.error_message = None;
    }

    /// Record a failed sync attempt.
    ///
    /// Reverts to `Pending` if the attempt cap has not been reached,
    /// otherwise becomes terminally `Failed`. Either way the error message
    /// is retained for operators.
    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.error_message = Some(error.into());
        self.status = if self.attempts >= MAX_ATTEMPTS {
            QueueStatus::Failed
        } else {
            QueueStatus::Pending
        };
    }
}
