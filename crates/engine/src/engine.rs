//! The catalog sync engine.
//!
//! Reconciliation rules, in order of precedence:
//!
//! - a pack without a remote product gets a fresh product + price pair;
//! - a pack whose remote product no longer exists is recreated from
//!   scratch (self-healing after out-of-band deletion);
//! - an existing remote product is overwritten with the current catalog
//!   fields; its price is replaced (deactivate old, mint new) only when
//!   the amount differs, because provider prices are immutable.
//!
//! Remote entities are never deleted, only deactivated.

use std::collections::BTreeMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use packsync_billing::{BillingClient, BillingError, PriceDraft, ProductDraft, ProductUpdate};
use packsync_catalog::{MAX_ATTEMPTS, Pack, RemoteRefs};
use packsync_core::PackId;
use packsync_store::{CatalogStore, StoreError, SyncQueueStore};

use super::pacer::Pacer;
use super::report::{ArchiveOutcome, SyncResult, SyncStatusReport, SyncSummary};

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// ISO currency code for every minted price.
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
        }
    }
}

/// Internal error for one reconciliation pass. Never escapes the engine;
/// public operations fold it into a [`SyncResult`].
#[derive(Debug, Error)]
enum ReconcileError {
    #[error(transparent)]
    Billing(#[from] BillingError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Keeps each published pack's representation in the billing provider
/// consistent with the local record: at most one remote product/price pair
/// per pack, structured results for every attempt.
pub struct CatalogSyncEngine<B, C, Q, P> {
    billing: B,
    catalog: C,
    queue: Q,
    pacer: P,
    config: EngineConfig,
}

impl<B, C, Q, P> CatalogSyncEngine<B, C, Q, P>
where
    B: BillingClient,
    C: CatalogStore,
    Q: SyncQueueStore,
    P: Pacer,
{
    pub fn new(billing: B, catalog: C, queue: Q, pacer: P) -> Self {
        Self {
            billing,
            catalog,
            queue,
            pacer,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Reconcile one pack with the billing provider.
    ///
    /// Total: every failure is folded into the returned [`SyncResult`].
    /// On success the local record holds the (possibly new) remote refs;
    /// on failure it is left untouched.
    pub async fn sync_item(&self, pack: &Pack) -> SyncResult {
        match self.reconcile(pack).await {
            Ok(refs) => {
                debug!(pack_id = %pack.id, product_ref = %refs.product_ref, "pack synced");
                SyncResult::synced(pack.id, refs)
            }
            Err(e) => {
                warn!(pack_id = %pack.id, error = %e, "pack sync failed");
                SyncResult::failed(pack.id, e.to_string())
            }
        }
    }

    async fn reconcile(&self, pack: &Pack) -> Result<RemoteRefs, ReconcileError> {
        let Some(product_ref) = pack.remote_product_ref.as_deref() else {
            return self.create_remote(pack).await;
        };

        match self.billing.retrieve_product(product_ref).await {
            Ok(_) => self.update_remote(pack, product_ref).await,
            Err(e) if e.is_not_found() => {
                // The product was deleted out-of-band; recreate from scratch.
                info!(pack_id = %pack.id, product_ref, "remote product gone, recreating");
                self.create_remote(pack).await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Create a fresh product + price pair and persist both refs.
    async fn create_remote(&self, pack: &Pack) -> Result<RemoteRefs, ReconcileError> {
        let product = self.billing.create_product(self.product_draft(pack)).await?;
        let price = self
            .billing
            .create_price(self.price_draft(pack, &product.id))
            .await?;

        let refs = RemoteRefs {
            product_ref: product.id,
            price_ref: price.id,
        };
        self.persist_refs(pack.id, &refs).await?;
        Ok(refs)
    }

    /// Overwrite the remote product and replace the price iff the amount
    /// changed.
    async fn update_remote(
        &self,
        pack: &Pack,
        product_ref: &str,
    ) -> Result<RemoteRefs, ReconcileError> {
        self.billing
            .update_product(product_ref, self.product_update(pack))
            .await?;

        let Some(price_ref) = pack.remote_price_ref.as_deref() else {
            // Half-synced record (product without price): mint the missing
            // price rather than failing.
            warn!(pack_id = %pack.id, product_ref, "pack has product ref but no price ref");
            return self.replace_price(pack, product_ref, None).await;
        };

        let current = self.billing.retrieve_price(price_ref).await?;
        if current.active && current.unit_amount == pack.target_amount() {
            return Ok(RemoteRefs {
                product_ref: product_ref.to_string(),
                price_ref: price_ref.to_string(),
            });
        }

        info!(
            pack_id = %pack.id,
            old_amount = %current.unit_amount,
            new_amount = %pack.target_amount(),
            "price changed, replacing remote price"
        );
        self.replace_price(pack, product_ref, Some(price_ref)).await
    }

    /// Deactivate `old_price_ref` (if any), mint a price at the current
    /// amount, and persist the new pair.
    async fn replace_price(
        &self,
        pack: &Pack,
        product_ref: &str,
        old_price_ref: Option<&str>,
    ) -> Result<RemoteRefs, ReconcileError> {
        if let Some(old) = old_price_ref {
            self.billing.deactivate_price(old).await?;
        }
        let price = self
            .billing
            .create_price(self.price_draft(pack, product_ref))
            .await?;

        let refs = RemoteRefs {
            product_ref: product_ref.to_string(),
            price_ref: price.id,
        };
        self.persist_refs(pack.id, &refs).await?;
        Ok(refs)
    }

    async fn persist_refs(&self, pack_id: PackId, refs: &RemoteRefs) -> Result<(), ReconcileError> {
        if let Err(e) = self.catalog.set_remote_refs(pack_id, refs).await {
            // The remote side effects are not rolled back; leave a trace so
            // the orphaned product can be reconciled by hand.
            warn!(
                %pack_id,
                product_ref = %refs.product_ref,
                price_ref = %refs.price_ref,
                error = %e,
                "remote entities created but local ref write failed"
            );
            return Err(e.into());
        }
        Ok(())
    }

    fn product_draft(&self, pack: &Pack) -> ProductDraft {
        ProductDraft {
            name: pack.name.clone(),
            description: Some(pack.description.clone()),
            metadata: self.product_metadata(pack),
            images: pack.thumbnail_url.iter().cloned().collect(),
        }
    }

    fn product_update(&self, pack: &Pack) -> ProductUpdate {
        ProductUpdate {
            name: Some(pack.name.clone()),
            description: Some(pack.description.clone()),
            metadata: Some(self.product_metadata(pack)),
            images: pack
                .thumbnail_url
                .as_ref()
                .map(|url| vec![url.clone()]),
            active: None,
        }
    }

    fn product_metadata(&self, pack: &Pack) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("pack_id".to_string(), pack.id.to_string()),
            ("slug".to_string(), pack.slug.clone()),
        ])
    }

    fn price_draft(&self, pack: &Pack, product_ref: &str) -> PriceDraft {
        PriceDraft {
            product_ref: product_ref.to_string(),
            unit_amount: pack.target_amount(),
            currency: self.config.currency.clone(),
            metadata: BTreeMap::from([("pack_id".to_string(), pack.id.to_string())]),
        }
    }

    /// Sync every published pack that has never been synced, sequentially,
    /// pausing between items.
    pub async fn sync_all_pending(&self) -> SyncSummary {
        let packs = match self.catalog.list_unsynced_published().await {
            Ok(packs) => packs,
            Err(e) => {
                error!(error = %e, "failed to list packs pending sync");
                return SyncSummary::batch_error(e.to_string());
            }
        };

        if packs.is_empty() {
            return SyncSummary::empty();
        }

        let mut summary = SyncSummary::empty();
        summary.total = packs.len() as u32;

        for pack in &packs {
            summary.record(self.sync_item(pack).await);
            self.pacer.pause().await;
        }

        info!(
            total = summary.total,
            synced = summary.synced,
            failed = summary.failed,
            "batch sync finished"
        );
        summary
    }

    /// Process up to `limit` eligible queue entries, oldest first.
    ///
    /// Each entry is claimed (attempts incremented) before any provider
    /// work, so a crash mid-sync shows up as a stuck `processing` row
    /// rather than a silent loss. Entries whose pack has been deleted are
    /// skipped and stay in `processing`; they count toward `total` only.
    pub async fn process_queue(&self, limit: u32) -> SyncSummary {
        let items = match self.queue.fetch_eligible(limit).await {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "failed to fetch eligible queue entries");
                return SyncSummary::batch_error(e.to_string());
            }
        };

        let mut summary = SyncSummary::empty();
        summary.total = items.len() as u32;

        for item in items {
            let entry_id = item.entry.id;

            let claimed = match self.queue.claim(entry_id).await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    // Another processor won the race since the fetch.
                    debug!(entry_id = %entry_id, "lost claim, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(entry_id = %entry_id, error = %e, "claim failed");
                    summary.record(SyncResult::failed(item.entry.pack_id, e.to_string()));
                    continue;
                }
            };

            let Some(pack) = item.pack else {
                warn!(
                    entry_id = %entry_id,
                    pack_id = %claimed.pack_id,
                    "queue entry references a deleted pack, skipping"
                );
                self.pacer.pause().await;
                continue;
            };

            let result = self.sync_item(&pack).await;
            if result.success {
                if let Err(e) = self.queue.mark_completed(entry_id, Utc::now()).await {
                    warn!(entry_id = %entry_id, error = %e, "failed to mark entry completed");
                }
            } else {
                let message = result.error.as_deref().unwrap_or("sync failed");
                let resolve = if claimed.attempts >= MAX_ATTEMPTS {
                    self.queue.mark_failed(entry_id, message).await
                } else {
                    self.queue.mark_retry(entry_id, message).await
                };
                if let Err(e) = resolve {
                    warn!(entry_id = %entry_id, error = %e, "failed to resolve entry");
                }
            }

            summary.record(result);
            self.pacer.pause().await;
        }

        info!(
            total = summary.total,
            synced = summary.synced,
            failed = summary.failed,
            "queue pass finished"
        );
        summary
    }

    /// Point-in-time counts of catalog sync state and queue backlog.
    /// Pure read; store failures propagate to the caller.
    pub async fn sync_status(&self) -> Result<SyncStatusReport, StoreError> {
        let synced = self.catalog.count_synced().await?;
        let pending = self.catalog.count_unsynced_published().await?;
        let queue = self.queue.counts().await?;
        Ok(SyncStatusReport {
            synced,
            pending,
            queue,
        })
    }

    /// Deactivate a pack's remote price and product. Idempotent: a pack
    /// with no remote refs (or whose remote entities are already gone)
    /// archives trivially. Nothing is ever deleted on the provider side.
    pub async fn archive_remote_item(&self, pack_id: PackId) -> ArchiveOutcome {
        let pack = match self.catalog.get(pack_id).await {
            Ok(Some(pack)) => pack,
            Ok(None) => return ArchiveOutcome::failed(format!("pack not found: {pack_id}")),
            Err(e) => return ArchiveOutcome::failed(e.to_string()),
        };

        let Some(product_ref) = pack.remote_product_ref.as_deref() else {
            return ArchiveOutcome::ok();
        };

        if let Some(price_ref) = pack.remote_price_ref.as_deref() {
            match self.billing.deactivate_price(price_ref).await {
                Ok(_) => {}
                Err(e) if e.is_not_found() => {
                    warn!(%pack_id, price_ref, "remote price already gone");
                }
                Err(e) => return ArchiveOutcome::failed(e.to_string()),
            }
        }

        let deactivate = ProductUpdate {
            active: Some(false),
            ..ProductUpdate::default()
        };
        match self.billing.update_product(product_ref, deactivate).await {
            Ok(_) => {
                info!(%pack_id, product_ref, "remote product archived");
                ArchiveOutcome::ok()
            }
            Err(e) if e.is_not_found() => ArchiveOutcome::ok(),
            Err(e) => ArchiveOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use packsync_billing::InMemoryBillingClient;
    use packsync_catalog::{QueueStatus, SyncQueueEntry};
    use packsync_core::MinorUnits;
    use packsync_store::{InMemoryCatalogStore, InMemorySyncQueueStore};

    use crate::pacer::NoopPacer;

    type TestEngine = CatalogSyncEngine<
        Arc<InMemoryBillingClient>,
        Arc<InMemoryCatalogStore>,
        Arc<InMemorySyncQueueStore>,
        NoopPacer,
    >;

    struct Harness {
        billing: Arc<InMemoryBillingClient>,
        catalog: Arc<InMemoryCatalogStore>,
        queue: Arc<InMemorySyncQueueStore>,
        engine: TestEngine,
    }

    fn harness() -> Harness {
        let billing = Arc::new(InMemoryBillingClient::new());
        let catalog = InMemoryCatalogStore::arc();
        let queue = Arc::new(InMemorySyncQueueStore::new(catalog.clone()));
        let engine = CatalogSyncEngine::new(
            billing.clone(),
            catalog.clone(),
            queue.clone(),
            NoopPacer,
        );
        Harness {
            billing,
            catalog,
            queue,
            engine,
        }
    }

    fn pack(name: &str, price: f64, published: bool) -> Pack {
        let now = Utc::now();
        Pack {
            id: PackId::new(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
            description: format!("{name} components"),
            short_description: None,
            price,
            is_published: published,
            components_count: Some(12),
            thumbnail_url: Some(format!("https://cdn.example.com/{name}.png")),
            remote_product_ref: None,
            remote_price_ref: None,
            created_at: now,
            updated_at: now,
        }
    }

    async fn stored(h: &Harness, id: PackId) -> Pack {
        h.catalog.get(id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn first_sync_creates_product_and_price_and_persists_refs() {
        let h = harness();
        let p = pack("Dashboard Pack", 29.99, true);
        h.catalog.insert(p.clone());

        let result = h.engine.sync_item(&p).await;
        assert!(result.success);

        let refs = stored(&h, p.id).await.remote_refs().unwrap();
        assert_eq!(result.product_ref.as_deref(), Some(refs.product_ref.as_str()));
        assert_eq!(result.price_ref.as_deref(), Some(refs.price_ref.as_str()));

        let product = h.billing.product(&refs.product_ref).unwrap();
        assert_eq!(product.name, "Dashboard Pack");
        assert_eq!(product.metadata.get("pack_id").unwrap(), &p.id.to_string());
        assert_eq!(product.metadata.get("slug").unwrap(), "dashboard-pack");

        let price = h.billing.price(&refs.price_ref).unwrap();
        assert_eq!(price.unit_amount, MinorUnits(2999));
        assert_eq!(price.currency, "usd");
        assert!(price.active);
    }

    #[tokio::test]
    async fn resync_with_unchanged_price_is_idempotent() {
        let h = harness();
        let p = pack("Forms Pack", 10.0, true);
        h.catalog.insert(p.clone());

        let first = h.engine.sync_item(&p).await;
        assert!(first.success);

        let synced = stored(&h, p.id).await;
        let second = h.engine.sync_item(&synced).await;
        assert!(second.success);

        assert_eq!(first.product_ref, second.product_ref);
        assert_eq!(first.price_ref, second.price_ref);

        let calls = h.billing.calls();
        assert_eq!(calls.products_created, 1);
        assert_eq!(calls.prices_created, 1);
        // Second pass overwrites product fields exactly once.
        assert_eq!(calls.products_updated, 1);
        assert_eq!(calls.prices_deactivated, 0);
    }

    #[tokio::test]
    async fn price_change_mints_new_price_and_retires_the_old_one() {
        let h = harness();
        let p = pack("Charts Pack", 10.0, true);
        h.catalog.insert(p.clone());
        assert!(h.engine.sync_item(&p).await.success);

        let mut changed = stored(&h, p.id).await;
        let old_price_ref = changed.remote_price_ref.clone().unwrap();
        changed.price = 12.0;
        h.catalog.insert(changed.clone());

        let result = h.engine.sync_item(&changed).await;
        assert!(result.success);

        let new_price_ref = result.price_ref.unwrap();
        assert_ne!(new_price_ref, old_price_ref);

        let old_price = h.billing.price(&old_price_ref).unwrap();
        assert!(!old_price.active, "old price must be deactivated, not deleted");

        let new_price = h.billing.price(&new_price_ref).unwrap();
        assert!(new_price.active);
        assert_eq!(new_price.unit_amount, MinorUnits(1200));

        let refs = stored(&h, p.id).await.remote_refs().unwrap();
        assert_eq!(refs.price_ref, new_price_ref);
    }

    #[tokio::test]
    async fn deleted_remote_product_self_heals_on_next_sync() {
        let h = harness();
        let p = pack("Tables Pack", 15.0, true);
        h.catalog.insert(p.clone());
        assert!(h.engine.sync_item(&p).await.success);

        let synced = stored(&h, p.id).await;
        let old_refs = synced.remote_refs().unwrap();
        h.billing.delete_product(&old_refs.product_ref);

        let result = h.engine.sync_item(&synced).await;
        assert!(result.success);

        let new_refs = stored(&h, p.id).await.remote_refs().unwrap();
        assert_ne!(new_refs.product_ref, old_refs.product_ref);
        assert!(h.billing.product(&new_refs.product_ref).is_some());
        assert!(h.billing.price(&new_refs.price_ref).is_some());
    }

    #[tokio::test]
    async fn half_synced_pack_gets_its_missing_price_minted() {
        let h = harness();
        let mut p = pack("Icons Pack", 5.0, true);
        h.catalog.insert(p.clone());
        // Fabricate the broken invariant: product ref without price ref.
        let product = h
            .billing
            .create_product(ProductDraft {
                name: p.name.clone(),
                ..Default::default()
            })
            .await
            .unwrap();
        p.remote_product_ref = Some(product.id.clone());
        h.catalog.insert(p.clone());

        let result = h.engine.sync_item(&p).await;
        assert!(result.success);

        let refs = stored(&h, p.id).await.remote_refs().unwrap();
        assert_eq!(refs.product_ref, product.id);
        assert_eq!(
            h.billing.price(&refs.price_ref).unwrap().unit_amount,
            MinorUnits(500)
        );
    }

    #[tokio::test]
    async fn provider_error_yields_failure_and_leaves_the_record_untouched() {
        let h = harness();
        let p = pack("Nav Pack", 8.0, true);
        h.catalog.insert(p.clone());
        h.billing
            .fail_next(BillingError::Network("connection reset".to_string()));

        let result = h.engine.sync_item(&p).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("connection reset"));
        assert!(!stored(&h, p.id).await.is_synced());
    }

    #[tokio::test]
    async fn store_write_failure_reports_failure_and_leaves_remote_orphans() {
        let h = harness();
        let p = pack("Modals Pack", 20.0, true);
        h.catalog.insert(p.clone());
        h.catalog
            .fail_next_write(StoreError::storage("constraint violation"));

        let result = h.engine.sync_item(&p).await;
        assert!(!result.success);

        // Remote side effects happened and are not rolled back.
        let calls = h.billing.calls();
        assert_eq!(calls.products_created, 1);
        assert_eq!(calls.prices_created, 1);
        // The local record is untouched, so the next sync recreates.
        assert!(!stored(&h, p.id).await.is_synced());
    }

    #[tokio::test]
    async fn empty_catalog_batch_is_a_distinct_success() {
        let h = harness();
        let summary = h.engine.sync_all_pending().await;
        assert_eq!(summary.total, 0);
        assert_eq!(summary.synced, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.success());
        assert!(summary.details.is_empty());
    }

    #[tokio::test]
    async fn batch_accounting_attempts_every_item() {
        let h = harness();
        let mut packs = Vec::new();
        for (i, name) in ["Alpha Pack", "Beta Pack", "Gamma Pack"].iter().enumerate() {
            let mut p = pack(name, 10.0, true);
            // Deterministic FIFO order.
            p.created_at = Utc::now() - chrono::Duration::minutes(10 - i as i64);
            h.catalog.insert(p.clone());
            packs.push(p);
        }
        // First pack's create_product fails; the batch keeps going.
        h.billing
            .fail_next(BillingError::Provider("rate limited".to_string()));

        let summary = h.engine.sync_all_pending().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.synced, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details.len(), 3);
        assert!(!summary.success());

        assert!(!summary.details[0].success);
        assert_eq!(summary.details[0].pack_id, packs[0].id);
        assert!(!stored(&h, packs[0].id).await.is_synced());
        assert!(stored(&h, packs[1].id).await.is_synced());
        assert!(stored(&h, packs[2].id).await.is_synced());
    }

    #[tokio::test]
    async fn unpublished_packs_are_excluded_from_the_batch() {
        let h = harness();
        let draft = pack("Draft Pack", 10.0, false);
        h.catalog.insert(draft.clone());

        let summary = h.engine.sync_all_pending().await;
        assert_eq!(summary.total, 0);
        assert!(!stored(&h, draft.id).await.is_synced());

        // A direct (operator-forced) sync still works on drafts.
        let result = h.engine.sync_item(&draft).await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn queue_pass_completes_entries() {
        let h = harness();
        let p = pack("Queue Pack", 7.5, true);
        h.catalog.insert(p.clone());
        let entry = SyncQueueEntry::new(p.id);
        let entry_id = h.queue.enqueue(entry).await.unwrap();

        let summary = h.engine.process_queue(10).await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.synced, 1);

        let resolved = h.queue.get(entry_id).await.unwrap().unwrap();
        assert_eq!(resolved.status, QueueStatus::Completed);
        assert_eq!(resolved.attempts, 1);
        assert!(resolved.processed_at.is_some());
        assert!(resolved.error_message.is_none());
        assert!(stored(&h, p.id).await.is_synced());
    }

    #[tokio::test]
    async fn queue_entry_fails_terminally_after_three_attempts() {
        let h = harness();
        let p = pack("Flaky Pack", 9.0, true);
        h.catalog.insert(p.clone());
        let entry_id = h.queue.enqueue(SyncQueueEntry::new(p.id)).await.unwrap();

        for attempt in 1..=MAX_ATTEMPTS {
            h.billing
                .fail_next(BillingError::Network("timeout".to_string()));
            let summary = h.engine.process_queue(10).await;
            assert_eq!(summary.total, 1, "attempt {attempt} should find the entry");
            assert_eq!(summary.failed, 1);

            let entry = h.queue.get(entry_id).await.unwrap().unwrap();
            assert_eq!(entry.attempts, attempt);
            assert_eq!(entry.error_message.as_deref(), Some("network error: timeout"));
            if attempt < MAX_ATTEMPTS {
                assert_eq!(entry.status, QueueStatus::Pending);
            } else {
                assert_eq!(entry.status, QueueStatus::Failed);
            }
        }

        // A fourth pass no longer sees the entry.
        let summary = h.engine.process_queue(10).await;
        assert_eq!(summary.total, 0);
        let entry = h.queue.get(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
        assert_eq!(entry.attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn queue_entry_succeeding_on_retry_is_completed() {
        let h = harness();
        let p = pack("Recovering Pack", 11.0, true);
        h.catalog.insert(p.clone());
        let entry_id = h.queue.enqueue(SyncQueueEntry::new(p.id)).await.unwrap();

        h.billing
            .fail_next(BillingError::Network("timeout".to_string()));
        assert_eq!(h.engine.process_queue(10).await.failed, 1);

        let summary = h.engine.process_queue(10).await;
        assert_eq!(summary.synced, 1);

        let entry = h.queue.get(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Completed);
        assert_eq!(entry.attempts, 2);
        assert!(entry.error_message.is_none());
    }

    #[tokio::test]
    async fn dangling_queue_entry_is_skipped_not_counted() {
        let h = harness();
        // Entry for a pack that was deleted after enqueue.
        let ghost = PackId::new();
        let entry_id = h.queue.enqueue(SyncQueueEntry::new(ghost)).await.unwrap();

        let summary = h.engine.process_queue(10).await;
        assert_eq!(summary.total, 1);
        assert_eq!(summary.synced, 0);
        assert_eq!(summary.failed, 0);
        assert!(summary.details.is_empty());

        // The claim stands; the entry stays visible as processing.
        let entry = h.queue.get(entry_id).await.unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Processing);
        assert_eq!(entry.attempts, 1);
    }

    #[tokio::test]
    async fn queue_pass_respects_the_limit_fifo() {
        let h = harness();
        let mut ids = Vec::new();
        for i in 0..3 {
            let p = pack(&format!("Pack {i}"), 5.0, true);
            h.catalog.insert(p.clone());
            let mut entry = SyncQueueEntry::new(p.id);
            entry.created_at = Utc::now() - chrono::Duration::minutes(10 - i);
            ids.push(h.queue.enqueue(entry).await.unwrap());
        }

        let summary = h.engine.process_queue(2).await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.synced, 2);

        // Oldest two resolved, newest untouched.
        assert_eq!(
            h.queue.get(ids[0]).await.unwrap().unwrap().status,
            QueueStatus::Completed
        );
        assert_eq!(
            h.queue.get(ids[1]).await.unwrap().unwrap().status,
            QueueStatus::Completed
        );
        assert_eq!(
            h.queue.get(ids[2]).await.unwrap().unwrap().status,
            QueueStatus::Pending
        );
    }

    #[tokio::test]
    async fn status_report_counts_catalog_and_queue() {
        let h = harness();
        let synced_pack = pack("Synced Pack", 10.0, true);
        h.catalog.insert(synced_pack.clone());
        assert!(h.engine.sync_item(&synced_pack).await.success);

        h.catalog.insert(pack("Waiting Pack", 10.0, true));
        h.catalog.insert(pack("Draft Pack", 10.0, false));

        let pending_entry = SyncQueueEntry::new(synced_pack.id);
        h.queue.enqueue(pending_entry).await.unwrap();
        let failed_id = h
            .queue
            .enqueue(SyncQueueEntry::new(synced_pack.id))
            .await
            .unwrap();
        h.queue.claim(failed_id).await.unwrap();
        h.queue.mark_failed(failed_id, "gave up").await.unwrap();

        let status = h.engine.sync_status().await.unwrap();
        assert_eq!(status.synced, 1);
        assert_eq!(status.pending, 1);
        assert_eq!(status.queue.pending, 1);
        assert_eq!(status.queue.failed, 1);
    }

    #[tokio::test]
    async fn archiving_an_unsynced_pack_is_a_trivial_success() {
        let h = harness();
        let p = pack("Fresh Pack", 10.0, true);
        h.catalog.insert(p.clone());

        let outcome = h.engine.archive_remote_item(p.id).await;
        assert!(outcome.success);
        // No provider traffic at all.
        assert_eq!(h.billing.calls(), Default::default());
    }

    #[tokio::test]
    async fn archiving_twice_is_idempotent_and_never_deletes() {
        let h = harness();
        let p = pack("Retiring Pack", 10.0, true);
        h.catalog.insert(p.clone());
        assert!(h.engine.sync_item(&p).await.success);
        let refs = stored(&h, p.id).await.remote_refs().unwrap();

        let first = h.engine.archive_remote_item(p.id).await;
        assert!(first.success);
        let second = h.engine.archive_remote_item(p.id).await;
        assert!(second.success);

        // Deactivated, still present.
        let product = h.billing.product(&refs.product_ref).unwrap();
        assert!(!product.active);
        let price = h.billing.price(&refs.price_ref).unwrap();
        assert!(!price.active);
    }

    #[tokio::test]
    async fn archiving_an_unknown_pack_reports_failure() {
        let h = harness();
        let outcome = h.engine.archive_remote_item(PackId::new()).await;
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn archive_provider_failure_is_reported() {
        let h = harness();
        let p = pack("Stubborn Pack", 10.0, true);
        h.catalog.insert(p.clone());
        assert!(h.engine.sync_item(&p).await.success);

        h.billing
            .fail_next(BillingError::Provider("internal error".to_string()));
        let outcome = h.engine.archive_remote_item(p.id).await;
        assert!(!outcome.success);
    }
}
