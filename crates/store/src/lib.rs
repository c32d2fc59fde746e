//! `packsync-store` — persistence seams for the catalog and the sync queue.
//!
//! Traits here are what the engine is injected with; in-memory
//! implementations back the tests, Postgres implementations back
//! production. The SQL schema lives in `migrations/`.

pub mod catalog;
pub mod error;
pub mod in_memory;
pub mod postgres;
pub mod queue;

pub use catalog::CatalogStore;
pub use error::StoreError;
pub use in_memory::{InMemoryCatalogStore, InMemorySyncQueueStore};
pub use postgres::{PostgresCatalogStore, PostgresSyncQueueStore};
pub use queue::{QueueCounts, QueueItem, SyncQueueStore};
