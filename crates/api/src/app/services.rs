//! Infrastructure wiring: billing client, stores, pacer, engine.
//!
//! Everything is held behind trait objects so the same router runs against
//! Postgres + Stripe in production and the in-memory fakes in tests.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use packsync_billing::{BillingClient, InMemoryBillingClient, StripeClient};
use packsync_engine::{CatalogSyncEngine, FixedDelayPacer, Pacer, pacer::DEFAULT_SYNC_DELAY};
use packsync_store::{
    CatalogStore, InMemoryCatalogStore, InMemorySyncQueueStore, PostgresCatalogStore,
    PostgresSyncQueueStore, SyncQueueStore,
};

pub type Engine = CatalogSyncEngine<
    Arc<dyn BillingClient>,
    Arc<dyn CatalogStore>,
    Arc<dyn SyncQueueStore>,
    Arc<dyn Pacer>,
>;

pub struct AppServices {
    pub engine: Engine,
    pub catalog: Arc<dyn CatalogStore>,
    pub queue: Arc<dyn SyncQueueStore>,
}

pub async fn build_services() -> AppServices {
    let billing: Arc<dyn BillingClient> = match std::env::var("STRIPE_SECRET_KEY") {
        Ok(key) if !key.is_empty() => Arc::new(StripeClient::new(key)),
        _ => {
            tracing::warn!("STRIPE_SECRET_KEY not set; using in-memory billing client");
            Arc::new(InMemoryBillingClient::new())
        }
    };

    let (catalog, queue): (Arc<dyn CatalogStore>, Arc<dyn SyncQueueStore>) =
        match std::env::var("DATABASE_URL") {
            Ok(url) => {
                let pool = PgPool::connect(&url)
                    .await
                    .expect("failed to connect to Postgres");
                (
                    Arc::new(PostgresCatalogStore::new(pool.clone())),
                    Arc::new(PostgresSyncQueueStore::new(pool)),
                )
            }
            Err(_) => {
                tracing::warn!("DATABASE_URL not set; using in-memory stores");
                let catalog = InMemoryCatalogStore::arc();
                let queue = Arc::new(InMemorySyncQueueStore::new(catalog.clone()));
                (catalog, queue)
            }
        };

    let delay = std::env::var("SYNC_DELAY_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_SYNC_DELAY);
    let pacer: Arc<dyn Pacer> = Arc::new(FixedDelayPacer::new(delay));

    let engine = CatalogSyncEngine::new(billing, catalog.clone(), queue.clone(), pacer);

    AppServices {
        engine,
        catalog,
        queue,
    }
}
