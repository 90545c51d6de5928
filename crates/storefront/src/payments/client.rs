//! Razorpay REST client.
//!
//! Authenticates with HTTP basic auth (key id / key secret). Every request
//! carries the configured timeout so a slow provider surfaces as
//! [`PaymentError::Timeout`] instead of hanging the checkout.

use async_trait::async_trait;
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument};

use super::error::PaymentError;
use super::types::{CreateProviderOrder, ErrorEnvelope, ProviderOrder, ProviderPayment};
use super::PaymentProvider;
use crate::config::PaymentConfig;

/// Payment provider client.
#[derive(Clone)]
pub struct RazorpayClient {
    /// HTTP client with the request timeout applied.
    client: Client,
    /// API base URL without trailing slash.
    api_base: String,
    /// Public key id (basic-auth user).
    key_id: String,
    /// Key secret (basic-auth password).
    key_secret: SecretString,
}

impl std::fmt::Debug for RazorpayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpayClient")
            .field("api_base", &self.api_base)
            .field("key_id", &self.key_id)
            .field("key_secret", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl RazorpayClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Request` if the HTTP client cannot be built.
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_base: config.api_base.clone(),
            key_id: config.key_id.clone(),
            key_secret: config.key_secret.clone(),
        })
    }

    /// Decode a success body or turn an error status into `PaymentError::Api`.
    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, PaymentError> {
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.description)
                .unwrap_or(body);
            error!(status = %status, message = %message, "Payment provider API error");
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PaymentError::Response(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for RazorpayClient {
    #[instrument(skip(self, request), fields(amount = request.amount, receipt = %request.receipt))]
    async fn create_order(
        &self,
        request: &CreateProviderOrder,
    ) -> Result<ProviderOrder, PaymentError> {
        let response = self
            .client
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .json(request)
            .send()
            .await
            .map_err(|e| PaymentError::from_reqwest(&e))?;

        let order: ProviderOrder = Self::decode(response).await?;
        debug!(provider_order_id = %order.id, "Provider order created");
        Ok(order)
    }

    #[instrument(skip(self))]
    async fn fetch_payment(&self, payment_id: &str) -> Result<ProviderPayment, PaymentError> {
        let response = self
            .client
            .get(format!("{}/payments/{payment_id}", self.api_base))
            .basic_auth(&self.key_id, Some(self.key_secret.expose_secret()))
            .send()
            .await
            .map_err(|e| PaymentError::from_reqwest(&e))?;

        let payment: ProviderPayment = Self::decode(response).await?;
        debug!(status = %payment.status, amount = payment.amount, "Provider payment fetched");
        Ok(payment)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use greenbasket_core::types::CurrencyCode;

    use super::*;

    #[test]
    fn test_debug_redacts_secret() {
        let client = RazorpayClient::new(&PaymentConfig {
            api_base: "https://api.razorpay.com/v1".to_string(),
            key_id: "rzp_test_visible".to_string(),
            key_secret: SecretString::from("hidden_key_secret_value"),
            currency: CurrencyCode::INR,
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        let debug_output = format!("{client:?}");
        assert!(debug_output.contains("rzp_test_visible"));
        assert!(!debug_output.contains("hidden_key_secret_value"));
    }
}
