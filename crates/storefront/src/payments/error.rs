//! Payment provider errors.

use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request did not complete within the configured timeout.
    #[error("payment provider timed out")]
    Timeout,

    /// HTTP request failed before a response arrived.
    #[error("payment provider request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("payment provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Failed to parse the response body.
    #[error("payment provider response error: {0}")]
    Response(String),
}

impl PaymentError {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Request(err.to_string())
        }
    }
}
