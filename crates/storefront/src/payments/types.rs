//! Provider wire types.

use serde::{Deserialize, Serialize};

/// Request body for creating a provider order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateProviderOrder {
    /// Amount in minor units (paise for INR).
    pub amount: i64,
    pub currency: String,
    /// Merchant receipt id, at most 40 characters.
    pub receipt: String,
    pub notes: serde_json::Value,
}

/// A provider order as returned on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

/// Status string the provider uses for captured funds.
pub const CAPTURED: &str = "captured";

/// A payment record as fetched from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPayment {
    pub id: String,
    pub status: String,
    /// Amount in minor units.
    pub amount: i64,
    pub currency: Option<String>,
    pub order_id: Option<String>,
    pub method: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    /// Unix timestamp in seconds.
    pub created_at: i64,
}

impl ProviderPayment {
    #[must_use]
    pub fn is_captured(&self) -> bool {
        self.status == CAPTURED
    }
}

/// Error envelope the provider wraps failures in.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub description: Option<String>,
}
