//! Store operation errors.

use thiserror::Error;

use packsync_core::{PackId, QueueEntryId};

/// Persistence-layer error.
///
/// These are **infrastructure errors** (connectivity, constraints) as
/// opposed to domain errors (validation, invariants).
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("pack not found: {0}")]
    PackNotFound(PackId),

    #[error("queue entry not found: {0}")]
    EntryNotFound(QueueEntryId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }
}
