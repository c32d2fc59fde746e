//! `packsync-engine` — reconciles the local pack catalog against the
//! billing provider's product/price catalog.
//!
//! The engine is handed its collaborators (billing client, catalog store,
//! queue store, pacer) at construction; it owns no global state and can be
//! driven entirely by fakes in tests.

pub mod engine;
pub mod pacer;
pub mod report;

pub use engine::{CatalogSyncEngine, EngineConfig};
pub use pacer::{FixedDelayPacer, NoopPacer, Pacer};
pub use report::{ArchiveOutcome, SyncResult, SyncStatusReport, SyncSummary};
