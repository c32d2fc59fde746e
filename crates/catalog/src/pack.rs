//! Catalog pack record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use packsync_core::{MinorUnits, PackId};

/// The pair of billing-provider references held by a synced pack.
///
/// A pack holds either both references or neither; a lone product or price
/// reference is a data defect that the engine self-heals on the next sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteRefs {
    pub product_ref: String,
    pub price_ref: String,
}

/// A sellable pack in the local catalog.
///
/// Mirrors one row of the `packs` table. Catalog management creates and
/// edits these rows; the sync engine only ever writes the remote reference
/// columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
    pub id: PackId,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub short_description: Option<String>,
    /// Price in major currency units (dollars), as stored in the catalog.
    pub price: f64,
    pub is_published: bool,
    pub components_count: Option<i32>,
    pub thumbnail_url: Option<String>,
    pub remote_product_ref: Option<String>,
    pub remote_price_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Pack {
    /// Whether this pack has ever been synced to the billing provider.
    pub fn is_synced(&self) -> bool {
        self.remote_product_ref.is_some()
    }

    /// Both remote references, if the pack is fully synced.
    pub fn remote_refs(&self) -> Option<RemoteRefs> {
        match (&self.remote_product_ref, &self.remote_price_ref) {
            (Some(product_ref), Some(price_ref)) => Some(RemoteRefs {
                product_ref: product_ref.clone(),
                price_ref: price_ref.clone(),
            }),
            _ => None,
        }
    }

    /// The amount the remote price must carry for this pack to be current.
    pub fn target_amount(&self) -> MinorUnits {
        MinorUnits::from_major(self.price)
    }

    /// Whether the automatic batch sync should pick this pack up.
    pub fn needs_initial_sync(&self) -> bool {
        self.is_published && self.remote_product_ref.is_none()
    }
}
