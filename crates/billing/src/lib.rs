//! `packsync-billing` — billing provider client abstraction.
//!
//! The engine talks to [`BillingClient`], never to a vendor SDK. Two
//! implementations ship here: [`InMemoryBillingClient`] for tests/dev and
//! [`StripeClient`] for production.

pub mod client;
pub mod in_memory;
pub mod stripe;

pub use client::{
    BillingClient, BillingError, PriceDraft, ProductDraft, ProductUpdate, RemotePrice,
    RemoteProduct,
};
pub use in_memory::InMemoryBillingClient;
pub use stripe::StripeClient;
