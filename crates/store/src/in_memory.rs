//! In-memory stores for tests and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use packsync_catalog::{Pack, QueueStatus, RemoteRefs, SyncQueueEntry};
use packsync_core::{PackId, QueueEntryId};

use super::catalog::CatalogStore;
use super::error::StoreError;
use super::queue::{QueueCounts, QueueItem, SyncQueueStore};

/// In-memory catalog store.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    packs: Mutex<HashMap<PackId, Pack>>,
    /// Errors to return from the next writes, consumed front-first.
    scripted_write_failures: Mutex<Vec<StoreError>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Seed a pack (stands in for catalog management).
    pub fn insert(&self, pack: Pack) {
        self.packs.lock().unwrap().insert(pack.id, pack);
    }

    /// Remove a pack, e.g. to fabricate a dangling queue reference.
    pub fn remove(&self, id: PackId) {
        self.packs.lock().unwrap().remove(&id);
    }

    /// Queue an error to be returned by the next `set_remote_refs` call.
    pub fn fail_next_write(&self, error: StoreError) {
        self.scripted_write_failures.lock().unwrap().push(error);
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn get(&self, id: PackId) -> Result<Option<Pack>, StoreError> {
        Ok(self.packs.lock().unwrap().get(&id).cloned())
    }

    async fn list_unsynced_published(&self) -> Result<Vec<Pack>, StoreError> {
        let packs = self.packs.lock().unwrap();
        let mut result: Vec<_> = packs
            .values()
            .filter(|p| p.needs_initial_sync())
            .cloned()
            .collect();
        result.sort_by_key(|p| p.created_at);
        Ok(result)
    }

    async fn set_remote_refs(&self, id: PackId, refs: &RemoteRefs) -> Result<(), StoreError> {
        {
            let mut failures = self.scripted_write_failures.lock().unwrap();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        let mut packs = self.packs.lock().unwrap();
        let pack = packs.get_mut(&id).ok_or(StoreError::PackNotFound(id))?;
        pack.remote_product_ref = Some(refs.product_ref.clone());
        pack.remote_price_ref = Some(refs.price_ref.clone());
        pack.updated_at = Utc::now();
        Ok(())
    }

    async fn count_synced(&self) -> Result<u64, StoreError> {
        let packs = self.packs.lock().unwrap();
        Ok(packs.values().filter(|p| p.is_synced()).count() as u64)
    }

    async fn count_unsynced_published(&self) -> Result<u64, StoreError> {
        let packs = self.packs.lock().unwrap();
        Ok(packs.values().filter(|p| p.needs_initial_sync()).count() as u64)
    }
}

/// In-memory sync queue store.
///
/// Holds a handle to the catalog store for the joined eligible fetch,
/// mirroring the SQL `LEFT JOIN` in the Postgres implementation.
#[derive(Debug)]
pub struct InMemorySyncQueueStore {
    entries: Mutex<HashMap<QueueEntryId, SyncQueueEntry>>,
    catalog: Arc<InMemoryCatalogStore>,
}

impl InMemorySyncQueueStore {
    pub fn new(catalog: Arc<InMemoryCatalogStore>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            catalog,
        }
    }
}

#[async_trait]
impl SyncQueueStore for InMemorySyncQueueStore {
    async fn enqueue(&self, entry: SyncQueueEntry) -> Result<QueueEntryId, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let id = entry.id;
        entries.insert(id, entry);
        Ok(id)
    }

    async fn get(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        Ok(self.entries.lock().unwrap().get(&id).cloned())
    }

    async fn fetch_eligible(&self, limit: u32) -> Result<Vec<QueueItem>, StoreError> {
        let mut eligible: Vec<_> = {
            let entries = self.entries.lock().unwrap();
            entries
                .values()
                .filter(|e| e.is_eligible())
                .cloned()
                .collect()
        };
        eligible.sort_by_key(|e| e.created_at);
        eligible.truncate(limit as usize);

        let packs = self.catalog.packs.lock().unwrap();
        Ok(eligible
            .into_iter()
            .map(|entry| {
                let pack = packs.get(&entry.pack_id).cloned();
                QueueItem { entry, pack }
            })
            .collect())
    }

    async fn claim(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get_mut(&id) else {
            return Ok(None);
        };
        // The eligibility check and the transition happen under one lock,
        // which is what the conditional UPDATE gives the Postgres store.
        if entry.claim().is_err() {
            return Ok(None);
        }
        Ok(Some(entry.clone()))
    }

    async fn mark_completed(
        &self,
        id: QueueEntryId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id).ok_or(StoreError::EntryNotFound(id))?;
        entry.complete(processed_at);
        Ok(())
    }

    async fn mark_retry(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id).ok_or(StoreError::EntryNotFound(id))?;
        entry.error_message = Some(error.to_string());
        entry.status = QueueStatus::Pending;
        Ok(())
    }

    async fn mark_failed(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries.get_mut(&id).ok_or(StoreError::EntryNotFound(id))?;
        entry.error_message = Some(error.to_string());
        entry.status = QueueStatus::Failed;
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let entries = self.entries.lock().unwrap();
        let mut counts = QueueCounts::default();
        for entry in entries.values() {
            match entry.status {
                QueueStatus::Pending => counts.pending += 1,
                QueueStatus::Processing => counts.processing += 1,
                QueueStatus::Completed => counts.completed += 1,
                QueueStatus::Failed => counts.failed += 1,
            }
        }
        Ok(counts)
    }
}
