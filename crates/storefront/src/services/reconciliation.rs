//! Payment reconciliation against the provider.
//!
//! Order of checks for a completed checkout:
//! 1. Recompute the checkout signature locally. A mismatch stops here,
//!    before any network call.
//! 2. Fetch the payment from the provider (bounded by the client timeout).
//! 3. Require `captured` status and the expected provider order id.
//! 4. Compare the captured minor units with the computed total, tolerating
//!    a difference of one minor unit.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use greenbasket_core::order::PaymentSnapshot;
use greenbasket_core::types::{CurrencyCode, UserId, to_minor_units};

use super::error::{CriticalCause, OrderError};
use crate::payments::{CreateProviderOrder, PaymentProvider, ProviderOrder, signature};

/// Largest accepted difference between captured and computed amounts.
const AMOUNT_TOLERANCE_MINOR: i64 = 1;

/// Receipt ids are limited to 40 characters by the provider.
const MAX_RECEIPT_LEN: usize = 40;

/// What the browser sends back after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    #[serde(alias = "razorpay_order_id")]
    pub provider_order_id: String,
    #[serde(alias = "razorpay_payment_id")]
    pub provider_payment_id: String,
    #[serde(alias = "razorpay_signature")]
    pub signature: String,
}

/// Verifies captured payments and creates provider orders.
#[derive(Clone)]
pub struct PaymentReconciler {
    provider: Arc<dyn PaymentProvider>,
    key_secret: SecretString,
    currency: CurrencyCode,
}

impl PaymentReconciler {
    #[must_use]
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        key_secret: SecretString,
        currency: CurrencyCode,
    ) -> Self {
        Self {
            provider,
            key_secret,
            currency,
        }
    }

    /// Create a provider order for `total`, tagged with the user id.
    ///
    /// # Errors
    ///
    /// `InvalidInput` for a zero total, `ProviderUnreachable` when the
    /// provider call fails.
    #[instrument(skip(self), fields(user_id = %user_id, total = %total))]
    pub async fn create_provider_order(
        &self,
        user_id: UserId,
        total: Decimal,
    ) -> Result<ProviderOrder, OrderError> {
        let amount = to_minor_units(total).map_err(|e| OrderError::Internal(e.to_string()))?;
        if amount == 0 {
            return Err(OrderError::InvalidInput(
                "nothing to pay online; place the order as cash on delivery".to_string(),
            ));
        }

        let mut receipt = format!("rcpt_{}", uuid::Uuid::new_v4().simple());
        receipt.truncate(MAX_RECEIPT_LEN);

        let request = CreateProviderOrder {
            amount,
            currency: self.currency.code().to_string(),
            receipt,
            notes: serde_json::json!({ "user_id": user_id.to_string() }),
        };

        let order = self.provider.create_order(&request).await.map_err(|e| {
            error!(error = %e, "Failed to create provider order");
            OrderError::ProviderUnreachable(e.to_string())
        })?;

        info!(provider_order_id = %order.id, amount = order.amount, "Provider order created");
        Ok(order)
    }

    /// Confirm that `proof` describes a captured payment of `expected_total`.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for blank or malformed ids
    /// - `SignatureInvalid` when the signature does not match
    /// - `ProviderUnreachable` on transport or API failure
    /// - `PaymentNotCaptured` when the payment is not captured for this order
    /// - `Critical(AmountMismatch)` when more than one minor unit apart
    #[instrument(
        skip(self, proof),
        fields(
            provider_order_id = %proof.provider_order_id,
            provider_payment_id = %proof.provider_payment_id,
            expected_total = %expected_total,
        )
    )]
    pub async fn reconcile(
        &self,
        proof: &PaymentProof,
        expected_total: Decimal,
    ) -> Result<PaymentSnapshot, OrderError> {
        let order_id = proof.provider_order_id.trim();
        let payment_id = proof.provider_payment_id.trim();
        if !is_provider_id(order_id) || !is_provider_id(payment_id) {
            return Err(OrderError::InvalidInput(
                "missing or malformed payment reference".to_string(),
            ));
        }

        if !signature::verify(&self.key_secret, order_id, payment_id, &proof.signature) {
            warn!("Payment signature mismatch");
            return Err(OrderError::SignatureInvalid);
        }

        let payment = self.provider.fetch_payment(payment_id).await.map_err(|e| {
            error!(error = %e, "Payment provider unreachable during reconciliation");
            OrderError::ProviderUnreachable(e.to_string())
        })?;

        if !payment.is_captured() || payment.order_id.as_deref() != Some(order_id) {
            warn!(
                status = %payment.status,
                fetched_order_id = ?payment.order_id,
                "Payment not captured for this order"
            );
            return Err(OrderError::PaymentNotCaptured {
                status: payment.status,
            });
        }

        let expected_minor =
            to_minor_units(expected_total).map_err(|e| OrderError::Internal(e.to_string()))?;
        let difference = (payment.amount - expected_minor).abs();

        if difference > AMOUNT_TOLERANCE_MINOR {
            error!(
                expected_minor,
                captured_minor = payment.amount,
                "Captured amount does not match order total"
            );
            return Err(OrderError::critical(
                CriticalCause::AmountMismatch {
                    expected_minor,
                    captured_minor: payment.amount,
                },
                order_id,
                payment_id,
            ));
        }
        if difference > 0 {
            warn!(
                degraded = true,
                expected_minor,
                captured_minor = payment.amount,
                "Captured amount accepted within rounding tolerance"
            );
        }

        let update_time =
            DateTime::<Utc>::from_timestamp(payment.created_at, 0).unwrap_or_else(Utc::now);

        info!(method = ?payment.method, "Payment reconciled");

        Ok(PaymentSnapshot {
            id: payment.id,
            status: payment.status,
            update_time,
            email_address: payment.email,
            method: payment.method,
            description: payment.description,
            provider_order_id: Some(order_id.to_string()),
        })
    }
}

/// Provider ids are short ASCII tokens like `order_9A33XWu170gUtm`.
fn is_provider_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
