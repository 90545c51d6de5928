//! Coupon ledger: resolve a code for an order, record usage, define coupons.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, instrument};

use greenbasket_core::coupon::{AppliedCoupon, Coupon, CouponDefinitionError, NewCoupon};
use greenbasket_core::types::{CouponId, OrderStatus, UserId};

use super::error::OrderError;
use crate::db::{CouponStore, RepositoryError};

/// Errors from coupon administration.
#[derive(Debug, Error)]
pub enum CouponAdminError {
    #[error(transparent)]
    Definition(#[from] CouponDefinitionError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Coupon validation and usage bookkeeping.
#[derive(Clone)]
pub struct CouponLedger {
    store: Arc<dyn CouponStore>,
}

impl CouponLedger {
    #[must_use]
    pub fn new(store: Arc<dyn CouponStore>) -> Self {
        Self { store }
    }

    /// Resolve `code` for a user's order with the given items subtotal.
    ///
    /// # Errors
    ///
    /// `InvalidCoupon`, `CouponExhausted`, `CouponUserLimitReached` or
    /// `MinPurchaseNotMet`, checked in that order.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn resolve(
        &self,
        user_id: UserId,
        code: &str,
        items_price: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(Coupon, AppliedCoupon), OrderError> {
        let coupon = self
            .store
            .find_active_by_code(code, now)
            .await?
            .ok_or(OrderError::InvalidCoupon)?;

        coupon.check_window(now)?;
        coupon.check_global_cap()?;

        if coupon.limit_for_same_user > 0 {
            let prior = self
                .store
                .count_user_orders_with_coupon(user_id, &coupon.code, &OrderStatus::COUPON_EXEMPT)
                .await?;
            coupon.check_user_limit(prior)?;
        }

        coupon.check_min_purchase(items_price)?;

        let applied = AppliedCoupon {
            coupon_id: coupon.id,
            code: coupon.code.clone(),
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_amount,
            discount_applied: coupon.discount_for(items_price),
        };

        Ok((coupon, applied))
    }

    /// Count one use and deactivate the coupon if that reached its cap.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if either statement fails.
    #[instrument(skip(self))]
    pub async fn record_usage(&self, coupon_id: CouponId) -> Result<Coupon, RepositoryError> {
        let mut coupon = self.store.increment_usage(coupon_id).await?;

        if coupon.cap_reached() && coupon.is_active {
            self.store.deactivate(coupon_id).await?;
            coupon.is_active = false;
            info!(code = %coupon.code, total_used = coupon.total_used, "Coupon usage cap reached, deactivated");
        }

        Ok(coupon)
    }

    /// Validate and store a new coupon definition.
    ///
    /// # Errors
    ///
    /// `CouponAdminError::Definition` for invalid input and
    /// `RepositoryError::Conflict` for a duplicate code.
    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    pub async fn create(&self, coupon: NewCoupon) -> Result<Coupon, CouponAdminError> {
        let coupon = coupon.validate()?;
        let created = self.store.create_coupon(coupon).await?;
        info!(coupon_id = %created.id, code = %created.code, "Coupon created");
        Ok(created)
    }
}
