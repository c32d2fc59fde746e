//! Structured results surfaced by the engine.
//!
//! Engine operations never propagate provider or store errors to the
//! caller; they fold every outcome into these types so a batch of N items
//! always attempts all N and reports each one.

use serde::Serialize;

use packsync_catalog::RemoteRefs;
use packsync_core::PackId;
use packsync_store::QueueCounts;

/// Outcome of syncing one pack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub pack_id: PackId,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResult {
    pub fn synced(pack_id: PackId, refs: RemoteRefs) -> Self {
        Self {
            pack_id,
            success: true,
            product_ref: Some(refs.product_ref),
            price_ref: Some(refs.price_ref),
            error: None,
        }
    }

    pub fn failed(pack_id: PackId, error: impl Into<String>) -> Self {
        Self {
            pack_id,
            success: false,
            product_ref: None,
            price_ref: None,
            error: Some(error.into()),
        }
    }
}

/// Aggregate outcome of a batch operation.
///
/// `total` counts the items the batch selected; in queue processing that
/// includes entries skipped as dangling, which appear in neither `synced`
/// nor `failed`. An empty batch is a success, distinct from a batch that
/// ran and failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub total: u32,
    pub synced: u32,
    pub failed: u32,
    pub details: Vec<SyncResult>,
    /// Batch-level failure (e.g. the candidate query itself failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncSummary {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn batch_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Fold one per-item outcome into the tallies and the detail list.
    /// Does not touch `total`, which the batch sets up front.
    pub fn record(&mut self, result: SyncResult) {
        if result.success {
            self.synced += 1;
        } else {
            self.failed += 1;
        }
        self.details.push(result);
    }

    pub fn success(&self) -> bool {
        self.failed == 0 && self.error.is_none()
    }
}

/// Point-in-time sync state, for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStatusReport {
    /// Packs holding remote references.
    pub synced: u64,
    /// Published packs still awaiting their first sync.
    pub pending: u64,
    pub queue: QueueCounts,
}

/// Outcome of archiving a pack's remote entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ArchiveOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_is_a_success() {
        let summary = SyncSummary::empty();
        assert!(summary.success());
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn recording_a_failure_flips_success() {
        let mut summary = SyncSummary::empty();
        summary.total = 2;
        summary.record(SyncResult::synced(
            PackId::new(),
            RemoteRefs {
                product_ref: "prod_1".to_string(),
                price_ref: "price_1".to_string(),
            },
        ));
        summary.record(SyncResult::failed(PackId::new(), "provider down"));

        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.details.len(), 2);
        assert!(!summary.success());
    }

    #[test]
    fn batch_error_is_not_a_success() {
        let summary = SyncSummary::batch_error("connection refused");
        assert!(!summary.success());
        assert_eq!(summary.failed, 0);
    }
}
