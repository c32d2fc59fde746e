//! Stripe adapter for [`BillingClient`].
//!
//! Talks to the Stripe REST API directly (form-encoded requests, bearer
//! auth). Only the product/price subset the engine needs is implemented.
//! Nothing outside this module knows the provider is Stripe.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use packsync_core::MinorUnits;

use super::client::{
    BillingClient, BillingError, PriceDraft, ProductDraft, ProductUpdate, RemotePrice,
    RemoteProduct,
};

const DEFAULT_BASE_URL: &str = "https://api.stripe.com/v1";

/// Stripe REST client.
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            secret_key: secret_key.into(),
        }
    }

    /// Override the API base URL (stripe-mock or a local stub).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, BillingError> {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))
    }

    async fn post_form(
        &self,
        path: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Response, BillingError> {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.secret_key)
            .form(params)
            .send()
            .await
            .map_err(|e| BillingError::Network(e.to_string()))
    }
}

/// Decode a Stripe response, mapping 404/`resource_missing` to `NotFound`.
async fn decode<T: for<'de> Deserialize<'de>>(
    resp: reqwest::Response,
    entity: &str,
) -> Result<T, BillingError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| BillingError::Network(e.to_string()))?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| BillingError::Parse(e.to_string()));
    }

    if status == reqwest::StatusCode::NOT_FOUND {
        return Err(BillingError::NotFound(entity.to_string()));
    }

    // Stripe wraps errors as {"error": {"code": ..., "message": ...}}.
    if let Ok(err_body) = serde_json::from_str::<StripeErrorBody>(&body) {
        if err_body.error.code.as_deref() == Some("resource_missing") {
            return Err(BillingError::NotFound(entity.to_string()));
        }
        return Err(BillingError::Provider(format!(
            "{}: {}",
            status,
            err_body.error.message.unwrap_or_default()
        )));
    }

    Err(BillingError::Provider(format!("{status}: {body}")))
}

fn metadata_params(metadata: &BTreeMap<String, String>, params: &mut Vec<(String, String)>) {
    for (key, value) in metadata {
        params.push((format!("metadata[{key}]"), value.clone()));
    }
}

fn image_params(images: &[String], params: &mut Vec<(String, String)>) {
    for image in images {
        params.push(("images[]".to_string(), image.clone()));
    }
}

#[async_trait]
impl BillingClient for StripeClient {
    async fn create_product(&self, draft: ProductDraft) -> Result<RemoteProduct, BillingError> {
        let mut params = vec![("name".to_string(), draft.name)];
        if let Some(description) = draft.description {
            params.push(("description".to_string(), description));
        }
        metadata_params(&draft.metadata, &mut params);
        image_params(&draft.images, &mut params);

        let resp = self.post_form("/products", &params).await?;
        let product: StripeProduct = decode(resp, "product").await?;
        Ok(product.into())
    }

    async fn retrieve_product(&self, id: &str) -> Result<RemoteProduct, BillingError> {
        let resp = self.get(&format!("/products/{id}")).await?;
        let product: StripeProduct = decode(resp, id).await?;
        Ok(product.into())
    }

    async fn update_product(
        &self,
        id: &str,
        update: ProductUpdate,
    ) -> Result<RemoteProduct, BillingError> {
        let mut params = Vec::new();
        if let Some(name) = update.name {
            params.push(("name".to_string(), name));
        }
        if let Some(description) = update.description {
            params.push(("description".to_string(), description));
        }
        if let Some(metadata) = update.metadata {
            metadata_params(&metadata, &mut params);
        }
        if let Some(images) = update.images {
            image_params(&images, &mut params);
        }
        if let Some(active) = update.active {
            params.push(("active".to_string(), active.to_string()));
        }

        let resp = self.post_form(&format!("/products/{id}"), &params).await?;
        let product: StripeProduct = decode(resp, id).await?;
        Ok(product.into())
    }

    async fn create_price(&self, draft: PriceDraft) -> Result<RemotePrice, BillingError> {
        let mut params = vec![
            ("product".to_string(), draft.product_ref),
            ("unit_amount".to_string(), draft.unit_amount.value().to_string()),
            ("currency".to_string(), draft.currency),
        ];
        metadata_params(&draft.metadata, &mut params);

        let resp = self.post_form("/prices", &params).await?;
        let price: StripePrice = decode(resp, "price").await?;
        Ok(price.into())
    }

    async fn retrieve_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        let resp = self.get(&format!("/prices/{id}")).await?;
        let price: StripePrice = decode(resp, id).await?;
        Ok(price.into())
    }

    async fn deactivate_price(&self, id: &str) -> Result<RemotePrice, BillingError> {
        let params = vec![("active".to_string(), "false".to_string())];
        let resp = self.post_form(&format!("/prices/{id}"), &params).await?;
        let price: StripePrice = decode(resp, id).await?;
        Ok(price.into())
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeProduct {
    id: String,
    name: String,
    description: Option<String>,
    active: bool,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl From<StripeProduct> for RemoteProduct {
    fn from(p: StripeProduct) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            active: p.active,
            metadata: p.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripePrice {
    id: String,
    product: String,
    unit_amount: i64,
    currency: String,
    active: bool,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl From<StripePrice> for RemotePrice {
    fn from(p: StripePrice) -> Self {
        Self {
            id: p.id,
            product_ref: p.product,
            unit_amount: MinorUnits(p.unit_amount),
            currency: p.currency,
            active: p.active,
            metadata: p.metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stripe_price_maps_to_remote_price() {
        let raw = r#"{
            "id": "price_1",
            "product": "prod_1",
            "unit_amount": 2999,
            "currency": "usd",
            "active": true,
            "metadata": {"pack_id": "abc"}
        }"#;
        let price: StripePrice = serde_json::from_str(raw).unwrap();
        let remote: RemotePrice = price.into();
        assert_eq!(remote.unit_amount, MinorUnits(2999));
        assert_eq!(remote.product_ref, "prod_1");
        assert_eq!(remote.metadata.get("pack_id").unwrap(), "abc");
    }

    #[test]
    fn missing_metadata_defaults_to_empty() {
        let raw = r#"{
            "id": "prod_1",
            "name": "Pack",
            "description": null,
            "active": true
        }"#;
        let product: StripeProduct = serde_json::from_str(raw).unwrap();
        assert!(product.metadata.is_empty());
    }
}
