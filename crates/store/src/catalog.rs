//! Catalog store contract.

use std::sync::Arc;

use async_trait::async_trait;

use packsync_catalog::{Pack, RemoteRefs};
use packsync_core::PackId;

use super::error::StoreError;

/// Row-level access to the `packs` table, restricted to what the sync
/// engine needs. Catalog management (creating/editing packs) goes through a
/// different surface and is out of scope here.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Fetch one pack by id.
    async fn get(&self, id: PackId) -> Result<Option<Pack>, StoreError>;

    /// Published packs that have never been synced (`remote_product_ref IS
    /// NULL AND is_published`), oldest first.
    async fn list_unsynced_published(&self) -> Result<Vec<Pack>, StoreError>;

    /// Persist both remote references onto a pack. The only catalog write
    /// the engine ever performs.
    async fn set_remote_refs(&self, id: PackId, refs: &RemoteRefs) -> Result<(), StoreError>;

    /// Count of packs with remote references (any publication state).
    async fn count_synced(&self) -> Result<u64, StoreError>;

    /// Count of published packs still awaiting their first sync.
    async fn count_unsynced_published(&self) -> Result<u64, StoreError>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn get(&self, id: PackId) -> Result<Option<Pack>, StoreError> {
        (**self).get(id).await
    }

    async fn list_unsynced_published(&self) -> Result<Vec<Pack>, StoreError> {
        (**self).list_unsynced_published().await
    }

    async fn set_remote_refs(&self, id: PackId, refs: &RemoteRefs) -> Result<(), StoreError> {
        (**self).set_remote_refs(id, refs).await
    }

    async fn count_synced(&self) -> Result<u64, StoreError> {
        (**self).count_synced().await
    }

    async fn count_unsynced_published(&self) -> Result<u64, StoreError> {
        (**self).count_unsynced_published().await
    }
}
