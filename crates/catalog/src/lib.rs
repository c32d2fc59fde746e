//! `packsync-catalog` — catalog domain records and the sync queue state machine.
//!
//! Pure domain: no storage or provider concerns. The sync engine and the
//! stores both depend on this crate, never the other way around.

pub mod pack;
pub mod queue;

pub use pack::{Pack, RemoteRefs};
pub use queue::{QueueStatus, SyncQueueEntry, MAX_ATTEMPTS};
