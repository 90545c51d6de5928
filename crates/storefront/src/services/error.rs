//! Order flow error taxonomy.
//!
//! Every failure of eligibility, pricing, coupon resolution, payment
//! reconciliation or finalization is one [`OrderError`] variant. Failures that
//! happen after the provider captured money are wrapped in
//! [`OrderError::Critical`] together with the provider ids needed for manual
//! reconciliation.

use rust_decimal::Decimal;
use thiserror::Error;

use greenbasket_core::coupon::CouponRuleError;
use greenbasket_core::order::{PreferenceError, TransitionError};
use greenbasket_core::pricing::PricingError;
use greenbasket_core::types::ItemId;

use crate::db::RepositoryError;

/// Errors raised while placing an order.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Malformed or missing request data.
    #[error("{0}")]
    InvalidInput(String),

    /// Referenced entity absent or not owned by the caller.
    #[error("{0} not found")]
    NotFound(String),

    /// Requested items are missing or inactive.
    #[error("some items are no longer available")]
    ItemsUnavailable(Vec<ItemId>),

    /// Not enough stock for a managed item.
    #[error("only {available} of {name} left in stock")]
    InsufficientStock {
        item_id: ItemId,
        name: String,
        available: i32,
    },

    /// No active coupon with that code is valid now.
    #[error("invalid or expired coupon code")]
    InvalidCoupon,

    /// The coupon's global usage cap is reached.
    #[error("this coupon has reached its usage limit")]
    CouponExhausted,

    /// The shopper used the coupon too often already.
    #[error("you have already used this coupon the maximum number of times ({limit})")]
    CouponUserLimitReached { limit: u32 },

    /// The items subtotal is below the coupon's minimum.
    #[error("add items worth {shortfall} more to use this coupon (minimum purchase {minimum})")]
    MinPurchaseNotMet { minimum: Decimal, shortfall: Decimal },

    /// The delivery address lies outside the delivery zone.
    #[error("the selected address is outside our delivery area")]
    OutOfZone,

    /// The delivery address has no stored coordinates.
    #[error("the selected address has no location; please update it and try again")]
    MissingCoordinates,

    /// The checkout signature does not match.
    #[error("payment signature verification failed")]
    SignatureInvalid,

    /// The provider has not captured the payment for this order.
    #[error("payment has not been captured (status: {status})")]
    PaymentNotCaptured { status: String },

    /// The provider could not be reached or answered with an error.
    #[error("payment status unknown, contact support")]
    ProviderUnreachable(String),

    /// Required deployment configuration is missing.
    #[error("server misconfigured: {0}")]
    ServerMisconfigured(String),

    /// Money moved but the order could not be created as requested.
    #[error("payment succeeded, order pending manual review")]
    Critical(Box<CriticalFailure>),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A post-capture failure with the ids support needs to reconcile it.
#[derive(Debug, Error)]
#[error("{cause} (provider order {provider_order_id}, payment {provider_payment_id})")]
pub struct CriticalFailure {
    pub cause: CriticalCause,
    pub provider_order_id: String,
    pub provider_payment_id: String,
}

/// What went wrong after capture.
#[derive(Debug, Error)]
pub enum CriticalCause {
    /// The captured amount differs from the computed total by more than one minor unit.
    #[error("captured {captured_minor} minor units, expected {expected_minor}")]
    AmountMismatch {
        expected_minor: i64,
        captured_minor: i64,
    },

    /// Delivery eligibility failed on the post-capture re-check.
    #[error("delivery re-check failed after capture: {0}")]
    Ineligible(String),

    /// The order could not be persisted after capture.
    #[error("order could not be recorded after capture: {0}")]
    PersistenceFailed(String),
}

impl OrderError {
    /// Wrap a post-capture failure.
    #[must_use]
    pub fn critical(
        cause: CriticalCause,
        provider_order_id: impl Into<String>,
        provider_payment_id: impl Into<String>,
    ) -> Self {
        Self::Critical(Box::new(CriticalFailure {
            cause,
            provider_order_id: provider_order_id.into(),
            provider_payment_id: provider_payment_id.into(),
        }))
    }

    /// Stable snake_case code used in JSON error bodies.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::NotFound(_) => "not_found",
            Self::ItemsUnavailable(_) => "items_unavailable",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidCoupon => "invalid_coupon",
            Self::CouponExhausted => "coupon_exhausted",
            Self::CouponUserLimitReached { .. } => "coupon_user_limit_reached",
            Self::MinPurchaseNotMet { .. } => "min_purchase_not_met",
            Self::OutOfZone => "out_of_zone",
            Self::MissingCoordinates => "missing_coordinates",
            Self::SignatureInvalid => "signature_invalid",
            Self::PaymentNotCaptured { .. } => "payment_not_captured",
            Self::ProviderUnreachable(_) => "provider_unreachable",
            Self::ServerMisconfigured(_) => "server_misconfigured",
            Self::Critical(failure) => match failure.cause {
                CriticalCause::AmountMismatch { .. } => "amount_mismatch",
                CriticalCause::Ineligible(_) => "post_capture_ineligible",
                CriticalCause::PersistenceFailed(_) => "post_capture_persistence_failed",
            },
            Self::Internal(_) => "internal",
        }
    }

    /// Whether this error must reach Sentry as an event.
    #[must_use]
    pub const fn is_server_side(&self) -> bool {
        matches!(
            self,
            Self::Critical(_)
                | Self::ProviderUnreachable(_)
                | Self::ServerMisconfigured(_)
                | Self::Internal(_)
        )
    }
}

impl From<PricingError> for OrderError {
    fn from(err: PricingError) -> Self {
        match err {
            PricingError::EmptyCart => Self::InvalidInput("your cart is empty".to_string()),
            PricingError::ItemsUnavailable(ids) => Self::ItemsUnavailable(ids),
            PricingError::InvalidQuantity { .. } => Self::InvalidInput(err.to_string()),
            PricingError::InsufficientStock {
                item_id,
                name,
                available,
            } => Self::InsufficientStock {
                item_id,
                name,
                available,
            },
        }
    }
}

impl From<CouponRuleError> for OrderError {
    fn from(err: CouponRuleError) -> Self {
        match err {
            CouponRuleError::OutsideWindow => Self::InvalidCoupon,
            CouponRuleError::Exhausted => Self::CouponExhausted,
            CouponRuleError::UserLimitReached { limit } => Self::CouponUserLimitReached { limit },
            CouponRuleError::MinPurchaseNotMet { minimum, shortfall } => {
                Self::MinPurchaseNotMet { minimum, shortfall }
            }
        }
    }
}

impl From<PreferenceError> for OrderError {
    fn from(err: PreferenceError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<TransitionError> for OrderError {
    fn from(err: TransitionError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

impl From<RepositoryError> for OrderError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound("record".to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}
