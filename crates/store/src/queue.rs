//! Sync queue store contract.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use packsync_catalog::{Pack, SyncQueueEntry};
use packsync_core::QueueEntryId;

use super::error::StoreError;

/// A queue entry joined with its parent pack. The pack is `None` when the
/// catalog row has been deleted out from under the queue (dangling
/// reference); the engine skips those.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub entry: SyncQueueEntry,
    pub pack: Option<Pack>,
}

/// Queue entry counts by status, for status reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

/// Durable, at-least-once sync queue.
///
/// Producers (catalog management) insert entries; the engine claims and
/// resolves them. `claim` must be atomic so overlapping processors cannot
/// double-run the same entry.
#[async_trait]
pub trait SyncQueueStore: Send + Sync {
    /// Insert a new entry.
    async fn enqueue(&self, entry: SyncQueueEntry) -> Result<QueueEntryId, StoreError>;

    /// Fetch one entry by id.
    async fn get(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError>;

    /// Up to `limit` eligible entries (`pending`/`failed`, attempts below
    /// the cap), oldest first, each joined with its pack.
    async fn fetch_eligible(&self, limit: u32) -> Result<Vec<QueueItem>, StoreError>;

    /// Atomically claim an entry: only an entry that is still eligible
    /// transitions to `processing` (attempts incremented). Returns the
    /// claimed entry, or `None` if another processor won the race or the
    /// entry became ineligible since it was fetched.
    async fn claim(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError>;

    /// Resolve a claimed entry as completed.
    async fn mark_completed(
        &self,
        id: QueueEntryId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Resolve a claimed entry as failed-but-retriable (back to `pending`).
    async fn mark_retry(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError>;

    /// Resolve a claimed entry as terminally failed.
    async fn mark_failed(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError>;

    /// Entry counts by status.
    async fn counts(&self) -> Result<QueueCounts, StoreError>;
}

#[async_trait]
impl<S> SyncQueueStore for Arc<S>
where
    S: SyncQueueStore + ?Sized,
{
    async fn enqueue(&self, entry: SyncQueueEntry) -> Result<QueueEntryId, StoreError> {
        (**self).enqueue(entry).await
    }

    async fn get(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        (**self).get(id).await
    }

    async fn fetch_eligible(&self, limit: u32) -> Result<Vec<QueueItem>, StoreError> {
        (**self).fetch_eligible(limit).await
    }

    async fn claim(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        (**self).claim(id).await
    }

    async fn mark_completed(
        &self,
        id: QueueEntryId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        (**self).mark_completed(id, processed_at).await
    }

    async fn mark_retry(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        (**self).mark_retry(id, error).await
    }

    async fn mark_failed(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        (**self).mark_failed(id, error).await
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        (**self).counts().await
    }
}
