//! In-memory billing provider for tests and local development.
//!
//! Behaves like the real provider where the engine cares: prices are
//! immutable, deactivation never deletes, unknown ids are `NotFound`.
//! Failure injection and call counters let engine tests script provider
//! behavior without wall-clock waits or a network.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::client::{
    BillingClient, BillingError, PriceDraft, ProductDraft, ProductUpdate, RemotePrice,
    RemoteProduct,
};

/// Counters for every provider call made, for asserting idempotency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub products_created: u32,
    pub products_retrieved: u32,
    pub products_updated: u32,
    pub prices_created: u32,
    pub prices_retrieved: u32,
    pub prices_deactivated: u32,
}

#[derive(Debug, Default)]
struct Inner {
    products: HashMap<String, RemoteProduct>,
    prices: HashMap<String, RemotePrice>,
    next_id: u64,
    calls: CallCounts,
    /// Errors to return from the next calls, consumed front-first.
    scripted_failures: Vec<BillingError>,
}

/// In-memory fake of the billing provider.
#[derive(Debug, Default)]
pub struct InMemoryBillingClient {
    inner: Mutex<Inner>,
}

impl InMemoryBillingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an error to be returned by the next provider call.
    pub fn fail_next(&self, error: BillingError) {
        self.inner.lock().unwrap().scripted_failures.push(error);
    }

    /// Simulate an out-of-band deletion (e.g. via the provider dashboard).
    pub fn delete_product(&self, id: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.products.remove(id);
        inner.prices.retain(|_, p| p.product_ref != id);
    }

    pub fn calls(&self) -> CallCounts {
        self.inner.lock().unwrap().calls
    }

    pub fn product(&self, id: &str) -> Option<RemoteProduct> {
        self.inner.lock().unwrap().products.get(id).cloned()
    }

    pub fn price(&self, id: &str) -> Option<RemotePrice> {
        self.inner.lock().unwrap().prices.get(id).cloned()
    }
}

impl Inner {
    fn take_scripted_failure(&mut self) -> Option<BillingError> {
        if self.scripted_failures.is_empty() {
            None
        } else {
            Some(self.scripted_failures.remove(0))
        }
    }

    fn mint_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }
}

#[async_trait]
impl BillingClient for InMemoryBillingClient {
    async fn create_product(&self, draft: ProductDraft) -> Result<RemoteProduct, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.products_created += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        let id = inner.mint_id("prod");
        let product = RemoteProduct {
            id: id.clone(),
            name: draft.name,
            description: draft.description,
            active: true,
            metadata: draft.metadata,
        };
        inner.products.insert(id, product.clone());
        Ok(product)
    }

    async fn retrieve_product(&self, id: &str) -> Result<RemoteProduct, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.products_retrieved += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        inner
            .products
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(id.to_string()))
    }

    async fn update_product(
        &self,
        id: &str,
        update: ProductUpdate,
    ) -> Result<RemoteProduct, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.products_updated += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        let product = inner
            .products
            .get_mut(id)
            .ok_or_else(|| BillingError::NotFound(id.to_string()))?;

        if let Some(name) = update.name {
            product.name = name;
        }
        if let Some(description) = update.description {
            product.description = Some(description);
        }
        if let Some(metadata) = update.metadata {
            product.metadata = metadata;
        }
        if let Some(active) = update.active {
            product.active = active;
        }
        Ok(product.clone())
    }

    async fn create_price(&self, draft: PriceDraft) -> Result<RemotePrice, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.prices_created += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        if !inner.products.contains_key(&draft.product_ref) {
            return Err(BillingError::NotFound(draft.product_ref));
        }

        let id = inner.mint_id("price");
        let price = RemotePrice {
            id: id.clone(),
            product_ref: draft.product_ref,
            unit_amount: draft.unit_amount,
            currency: draft.currency,
            active: true,
            metadata: draft.metadata,
        };
        inner.prices.insert(id, price.clone());
        Ok(price)
    }

    async fn retrieve_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.prices_retrieved += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        inner
            .prices
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::NotFound(id.to_string()))
    }

    async fn deactivate_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.prices_deactivated += 1;
        if let Some(err) = inner.take_scripted_failure() {
            return Err(err);
        }

        let price = inner
            .prices
            .get_mut(id)
            .ok_or_else(|| BillingError::NotFound(id.to_string()))?;
        price.active = false;
        Ok(price.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use packsync_core::MinorUnits;

    fn draft(name: &str) -> ProductDraft {
        ProductDraft {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_retrieve_product() {
        let client = InMemoryBillingClient::new();
        let created = client.create_product(draft("Dashboard Pack")).await.unwrap();
        let fetched = client.retrieve_product(&created.id).await.unwrap();
        assert_eq!(created, fetched);
        assert!(fetched.active);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let client = InMemoryBillingClient::new();
        let err = client.retrieve_product("prod_missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn prices_require_an_existing_product() {
        let client = InMemoryBillingClient::new();
        let err = client
            .create_price(PriceDraft {
                product_ref: "prod_missing".to_string(),
                unit_amount: MinorUnits(1000),
                currency: "usd".to_string(),
                metadata: Default::default(),
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn deactivation_keeps_the_price_around() {
        let client = InMemoryBillingClient::new();
        let product = client.create_product(draft("Pack")).await.unwrap();
        let price = client
            .create_price(PriceDraft {
                product_ref: product.id.clone(),
                unit_amount: MinorUnits(1000),
                currency: "usd".to_string(),
                metadata: Default::default(),
            })
            .await
            .unwrap();

        let deactivated = client.deactivate_price(&price.id).await.unwrap();
        assert!(!deactivated.active);
        // Still retrievable, just inactive.
        let fetched = client.retrieve_price(&price.id).await.unwrap();
        assert!(!fetched.active);
        assert_eq!(fetched.unit_amount, MinorUnits(1000));
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed_in_order() {
        let client = InMemoryBillingClient::new();
        client.fail_next(BillingError::Network("connection reset".to_string()));

        let err = client.create_product(draft("Pack")).await.unwrap_err();
        assert!(matches!(err, BillingError::Network(_)));

        // Next call succeeds.
        client.create_product(draft("Pack")).await.unwrap();
        assert_eq!(client.calls().products_created, 2);
    }
}
