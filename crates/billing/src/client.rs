//! Provider-neutral billing client contract.
//!
//! Modeled after the lowest common denominator of product/price billing
//! APIs: products are mutable, prices are immutable once created — changing
//! an amount means deactivating the old price and minting a new one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use packsync_core::MinorUnits;

/// Billing provider operation error.
#[derive(Debug, Error, Clone)]
pub enum BillingError {
    /// The referenced remote entity does not exist (e.g. deleted out-of-band).
    #[error("remote entity not found: {0}")]
    NotFound(String),

    /// The provider rejected the request (4xx/5xx with a message).
    #[error("provider error: {0}")]
    Provider(String),

    /// Transport-level failure (DNS, TLS, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The provider response could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl BillingError {
    /// Whether this error means the remote entity is gone and the caller
    /// should recreate it rather than fail.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::NotFound(_))
    }
}

/// A product as the billing provider sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteProduct {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub metadata: BTreeMap<String, String>,
}

/// A price as the billing provider sees it. Immutable except for `active`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePrice {
    pub id: String,
    pub product_ref: String,
    pub unit_amount: MinorUnits,
    pub currency: String,
    pub active: bool,
    pub metadata: BTreeMap<String, String>,
}

/// Fields for creating a new remote product.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductDraft {
    pub name: String,
    pub description: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub images: Vec<String>,
}

/// Partial update of an existing remote product. `None` fields are left
/// untouched by the provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
    pub images: Option<Vec<String>>,
    pub active: Option<bool>,
}

/// Fields for minting a new remote price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceDraft {
    pub product_ref: String,
    pub unit_amount: MinorUnits,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

/// Billing provider client.
///
/// Implementations must map their "entity does not exist" condition to
/// [`BillingError::NotFound`]; the engine's self-healing depends on it.
#[async_trait]
pub trait BillingClient: Send + Sync {
    async fn create_product(&self, draft: ProductDraft) -> Result<RemoteProduct, BillingError>;

    async fn retrieve_product(&self, id: &str) -> Result<RemoteProduct, BillingError>;

    async fn update_product(
        &self,
        id: &str,
        update: ProductUpdate,
    ) -> Result<RemoteProduct, BillingError>;

    async fn create_price(&self, draft: PriceDraft) -> Result<RemotePrice, BillingError>;

    async fn retrieve_price(&self, id: &str) -> Result<RemotePrice, BillingError>;

    /// Deactivate a price. Prices are never deleted.
    async fn deactivate_price(&self, id: &str) -> Result<RemotePrice, BillingError>;
}

#[async_trait]
impl<C> BillingClient for Arc<C>
where
    C: BillingClient + ?Sized,
{
    async fn create_product(&self, draft: ProductDraft) -> Result<RemoteProduct, BillingError> {
        (**self).create_product(draft).await
    }

    async fn retrieve_product(&self, id: &str) -> Result<RemoteProduct, BillingError> {
        (**self).retrieve_product(id).await
    }

    async fn update_product(
        &self,
        id: &str,
        update: ProductUpdate,
    ) -> Result<RemoteProduct, BillingError> {
        (**self).update_product(id, update).await
    }

    async fn create_price(&self, draft: PriceDraft) -> Result<RemotePrice, BillingError> {
        (**self).create_price(draft).await
    }

    async fn retrieve_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        (**self).retrieve_price(id).await
    }

    async fn deactivate_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        (**self).deactivate_price(id).await
    }
}
