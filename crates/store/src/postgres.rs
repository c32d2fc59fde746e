//! Postgres-backed catalog and sync queue stores.
//!
//! SQLx errors are not inspected beyond their message: every failure maps
//! to `StoreError::Storage`, because the engine treats all store failures
//! the same way (fail the item, keep the batch going). The schema is in
//! `migrations/0001_catalog_sync.sql`.
//!
//! ## Claim semantics
//!
//! `claim` is a single conditional `UPDATE ... RETURNING`: the row only
//! transitions to `processing` if it is still eligible at execution time,
//! so two overlapping processors cannot both claim the same entry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use packsync_catalog::{MAX_ATTEMPTS, Pack, QueueStatus, RemoteRefs, SyncQueueEntry};
use packsync_core::{PackId, QueueEntryId};

use super::catalog::CatalogStore;
use super::error::StoreError;
use super::queue::{QueueCounts, QueueItem, SyncQueueStore};

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("{operation}: {e}"))
}

const PACK_COLUMNS: &str = "id, name, slug, description, short_description, price, \
     is_published, components_count, thumbnail_url, remote_product_ref, \
     remote_price_ref, created_at, updated_at";

fn row_to_pack(row: &PgRow) -> Result<Pack, sqlx::Error> {
    Ok(Pack {
        id: PackId::from_uuid(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        description: row.try_get("description")?,
        short_description: row.try_get("short_description")?,
        price: row.try_get("price")?,
        is_published: row.try_get("is_published")?,
        components_count: row.try_get("components_count")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        remote_product_ref: row.try_get("remote_product_ref")?,
        remote_price_ref: row.try_get("remote_price_ref")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_entry(row: &PgRow) -> Result<SyncQueueEntry, StoreError> {
    let status: String = row
        .try_get("status")
        .map_err(|e| map_sqlx_error("decode status", e))?;
    Ok(SyncQueueEntry {
        id: QueueEntryId::from_uuid(
            row.try_get("id")
                .map_err(|e| map_sqlx_error("decode id", e))?,
        ),
        pack_id: PackId::from_uuid(
            row.try_get("pack_id")
                .map_err(|e| map_sqlx_error("decode pack_id", e))?,
        ),
        status: QueueStatus::parse(&status).map_err(|e| StoreError::Storage(e.to_string()))?,
        attempts: row
            .try_get("attempts")
            .map_err(|e| map_sqlx_error("decode attempts", e))?,
        error_message: row
            .try_get("error_message")
            .map_err(|e| map_sqlx_error("decode error_message", e))?,
        created_at: row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("decode created_at", e))?,
        processed_at: row
            .try_get("processed_at")
            .map_err(|e| map_sqlx_error("decode processed_at", e))?,
    })
}

/// Postgres-backed catalog store.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self), fields(pack_id = %id))]
    async fn get(&self, id: PackId) -> Result<Option<Pack>, StoreError> {
        let row = sqlx::query(&format!("SELECT {PACK_COLUMNS} FROM packs WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get pack", e))?;

        row.map(|r| row_to_pack(&r))
            .transpose()
            .map_err(|e| map_sqlx_error("decode pack", e))
    }

    async fn list_unsynced_published(&self) -> Result<Vec<Pack>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {PACK_COLUMNS} FROM packs \
             WHERE remote_product_ref IS NULL AND is_published \
             ORDER BY created_at ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list unsynced packs", e))?;

        rows.iter()
            .map(|r| row_to_pack(r).map_err(|e| map_sqlx_error("decode pack", e)))
            .collect()
    }

    #[instrument(skip(self, refs), fields(pack_id = %id))]
    async fn set_remote_refs(&self, id: PackId, refs: &RemoteRefs) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE packs \
             SET remote_product_ref = $2, remote_price_ref = $3, updated_at = now() \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(&refs.product_ref)
        .bind(&refs.price_ref)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("set remote refs", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::PackNotFound(id));
        }
        Ok(())
    }

    async fn count_synced(&self) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM packs WHERE remote_product_ref IS NOT NULL")
                .fetch_one(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("count synced", e))?;
        Ok(count as u64)
    }

    async fn count_unsynced_published(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM packs WHERE remote_product_ref IS NULL AND is_published",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count unsynced", e))?;
        Ok(count as u64)
    }
}

/// Postgres-backed sync queue store.
#[derive(Debug, Clone)]
pub struct PostgresSyncQueueStore {
    pool: Arc<PgPool>,
}

impl PostgresSyncQueueStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait]
impl SyncQueueStore for PostgresSyncQueueStore {
    async fn enqueue(&self, entry: SyncQueueEntry) -> Result<QueueEntryId, StoreError> {
        sqlx::query(
            "INSERT INTO sync_queue \
             (id, pack_id, status, attempts, error_message, created_at, processed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(entry.id.as_uuid())
        .bind(entry.pack_id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.attempts)
        .bind(&entry.error_message)
        .bind(entry.created_at)
        .bind(entry.processed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("enqueue", e))?;
        Ok(entry.id)
    }

    async fn get(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        let row = sqlx::query(
            "SELECT id, pack_id, status, attempts, error_message, created_at, processed_at \
             FROM sync_queue WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get entry", e))?;

        row.map(|r| row_to_entry(&r)).transpose()
    }

    async fn fetch_eligible(&self, limit: u32) -> Result<Vec<QueueItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT \
                 q.id, q.pack_id, q.status, q.attempts, q.error_message, \
                 q.created_at, q.processed_at, \
                 p.id AS p_id, p.name, p.slug, p.description, p.short_description, \
                 p.price, p.is_published, p.components_count, p.thumbnail_url, \
                 p.remote_product_ref, p.remote_price_ref, \
                 p.created_at AS p_created_at, p.updated_at AS p_updated_at \
             FROM sync_queue q \
             LEFT JOIN packs p ON p.id = q.pack_id \
             WHERE q.status IN ('pending', 'failed') AND q.attempts < $1 \
             ORDER BY q.created_at ASC \
             LIMIT $2",
        )
        .bind(MAX_ATTEMPTS)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch eligible", e))?;

        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let entry = row_to_entry(&row)?;
            let pack_id: Option<uuid::Uuid> = row
                .try_get("p_id")
                .map_err(|e| map_sqlx_error("decode joined pack", e))?;
            let pack = if pack_id.is_some() {
                Some(joined_row_to_pack(&row)?)
            } else {
                None
            };
            items.push(QueueItem { entry, pack });
        }
        Ok(items)
    }

    #[instrument(skip(self), fields(entry_id = %id))]
    async fn claim(&self, id: QueueEntryId) -> Result<Option<SyncQueueEntry>, StoreError> {
        let row = sqlx::query(
            "UPDATE sync_queue \
             SET status = 'processing', attempts = attempts + 1 \
             WHERE id = $1 AND status IN ('pending', 'failed') AND attempts < $2 \
             RETURNING id, pack_id, status, attempts, error_message, created_at, processed_at",
        )
        .bind(id.as_uuid())
        .bind(MAX_ATTEMPTS)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("claim", e))?;

        row.map(|r| row_to_entry(&r)).transpose()
    }

    async fn mark_completed(
        &self,
        id: QueueEntryId,
        processed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE sync_queue \
             SET status = 'completed', processed_at = $2, error_message = NULL \
             WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(processed_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("mark completed", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn mark_retry(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE sync_queue SET status = 'pending', error_message = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(error)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("mark retry", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn mark_failed(&self, id: QueueEntryId, error: &str) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE sync_queue SET status = 'failed', error_message = $2 WHERE id = $1")
                .bind(id.as_uuid())
                .bind(error)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("mark failed", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::EntryNotFound(id));
        }
        Ok(())
    }

    async fn counts(&self) -> Result<QueueCounts, StoreError> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM sync_queue GROUP BY status")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("queue counts", e))?;

        let mut counts = QueueCounts::default();
        for row in rows {
            let status: String = row
                .try_get("status")
                .map_err(|e| map_sqlx_error("decode status", e))?;
            let n: i64 = row.try_get("n").map_err(|e| map_sqlx_error("decode count", e))?;
            match QueueStatus::parse(&status).map_err(|e| StoreError::Storage(e.to_string()))? {
                QueueStatus::Pending => counts.pending = n as u64,
                QueueStatus::Processing => counts.processing = n as u64,
                QueueStatus::Completed => counts.completed = n as u64,
                QueueStatus::Failed => counts.failed = n as u64,
            }
        }
        Ok(counts)
    }
}

fn joined_row_to_pack(row: &PgRow) -> Result<Pack, StoreError> {
    let decode = |e| map_sqlx_error("decode joined pack", e);
    Ok(Pack {
        id: PackId::from_uuid(row.try_get("p_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        slug: row.try_get("slug").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        short_description: row.try_get("short_description").map_err(decode)?,
        price: row.try_get("price").map_err(decode)?,
        is_published: row.try_get("is_published").map_err(decode)?,
        components_count: row.try_get("components_count").map_err(decode)?,
        thumbnail_url: row.try_get("thumbnail_url").map_err(decode)?,
        remote_product_ref: row.try_get("remote_product_ref").map_err(decode)?,
        remote_price_ref: row.try_get("remote_price_ref").map_err(decode)?,
        created_at: row.try_get("p_created_at").map_err(decode)?,
        updated_at: row.try_get("p_updated_at").map_err(decode)?,
    })
}
