//! Payment provider integration.
//!
//! The provider is reached through the narrow [`PaymentProvider`] trait:
//! create an order for an amount in minor units, and fetch a payment by id.
//! [`RazorpayClient`] is the production implementation; tests substitute a
//! scripted fake.

pub mod client;
pub mod error;
pub mod signature;
pub mod types;

use async_trait::async_trait;

pub use client::RazorpayClient;
pub use error::PaymentError;
pub use types::{CreateProviderOrder, ProviderOrder, ProviderPayment};

/// Operations the order subsystem needs from the payment provider.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a provider-side order the checkout widget can pay against.
    async fn create_order(&self, request: &CreateProviderOrder)
    -> Result<ProviderOrder, PaymentError>;

    /// Fetch the authoritative record of a payment.
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProviderPayment, PaymentError>;
}
