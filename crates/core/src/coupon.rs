//! Coupon rules.
//!
//! A coupon is looked up by code, then checked in this order: validity window,
//! global usage cap, per-shopper usage, minimum purchase. The discount is the
//! raw percentage or flat amount, clamped to the coupon's cap and then to
//! `[0, items_price]`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{CouponId, round_money};

/// How the discount value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// `discount_amount` percent of the items subtotal.
    Percentage,
    /// `discount_amount` off, flat.
    FixedAmount,
}

/// A stored coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
    pub id: CouponId,
    /// Upper-cased; lookups are case-insensitive.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    pub min_purchase: Decimal,
    /// Zero means uncapped. Always zero for fixed-amount coupons.
    pub max_discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    pub total_used: u32,
    /// Zero means unlimited.
    pub max_total_uses: u32,
    /// Zero means unlimited.
    pub limit_for_same_user: u32,
    pub is_active: bool,
}

/// A coupon rule that failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponRuleError {
    #[error("coupon is not valid at this time")]
    OutsideWindow,
    #[error("coupon has reached its usage limit")]
    Exhausted,
    #[error("you have already used this coupon the maximum number of times ({limit})")]
    UserLimitReached { limit: u32 },
    #[error("add items worth {shortfall} more to use this coupon (minimum purchase {minimum})")]
    MinPurchaseNotMet { minimum: Decimal, shortfall: Decimal },
}

/// Errors raised when an admin defines a coupon.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CouponDefinitionError {
    #[error("coupon code cannot be empty")]
    EmptyCode,
    #[error("discount amount must be greater than zero")]
    NonPositiveDiscount,
    #[error("percentage discount cannot exceed 100, got {0}")]
    PercentageTooLarge(Decimal),
    #[error("{0} cannot be negative")]
    Negative(&'static str),
    #[error("expire date must not be before start date")]
    ExpiresBeforeStart,
}

/// Admin input for a new coupon.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_amount: Decimal,
    #[serde(default)]
    pub min_purchase: Decimal,
    #[serde(default)]
    pub max_discount: Decimal,
    pub start_date: DateTime<Utc>,
    pub expire_date: DateTime<Utc>,
    #[serde(default)]
    pub max_total_uses: u32,
    #[serde(default)]
    pub limit_for_same_user: u32,
}

impl NewCoupon {
    /// Normalize and check the definition.
    ///
    /// The code is trimmed and upper-cased, and a fixed-amount coupon always
    /// ends up with `max_discount = 0`.
    ///
    /// # Errors
    ///
    /// Returns `CouponDefinitionError` for an empty code, a non-positive or
    /// over-100% discount, negative thresholds, or an inverted window.
    pub fn validate(mut self) -> Result<Self, CouponDefinitionError> {
        self.code = self.code.trim().to_uppercase();
        if self.code.is_empty() {
            return Err(CouponDefinitionError::EmptyCode);
        }
        if self.discount_amount <= Decimal::ZERO {
            return Err(CouponDefinitionError::NonPositiveDiscount);
        }
        if self.min_purchase < Decimal::ZERO {
            return Err(CouponDefinitionError::Negative("minimum purchase"));
        }
        if self.max_discount < Decimal::ZERO {
            return Err(CouponDefinitionError::Negative("maximum discount"));
        }
        if self.expire_date < self.start_date {
            return Err(CouponDefinitionError::ExpiresBeforeStart);
        }

        match self.discount_type {
            DiscountType::Percentage if self.discount_amount > Decimal::ONE_HUNDRED => {
                return Err(CouponDefinitionError::PercentageTooLarge(self.discount_amount));
            }
            DiscountType::Percentage => {}
            DiscountType::FixedAmount => self.max_discount = Decimal::ZERO,
        }

        Ok(self)
    }
}

impl Coupon {
    /// Whether `now` falls inside `[start_date, expire_date]` and the coupon is active.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.start_date <= now && now <= self.expire_date
    }

    /// Check the validity window.
    ///
    /// # Errors
    ///
    /// `CouponRuleError::OutsideWindow` when inactive or outside the window.
    pub fn check_window(&self, now: DateTime<Utc>) -> Result<(), CouponRuleError> {
        if self.is_live(now) {
            Ok(())
        } else {
            Err(CouponRuleError::OutsideWindow)
        }
    }

    /// Check the global usage cap.
    ///
    /// # Errors
    ///
    /// `CouponRuleError::Exhausted` once `total_used` reached `max_total_uses`.
    pub const fn check_global_cap(&self) -> Result<(), CouponRuleError> {
        if self.max_total_uses > 0 && self.total_used >= self.max_total_uses {
            Err(CouponRuleError::Exhausted)
        } else {
            Ok(())
        }
    }

    /// Check how often this shopper already used the coupon.
    ///
    /// # Errors
    ///
    /// `CouponRuleError::UserLimitReached` when `prior_uses` is at or above the limit.
    pub const fn check_user_limit(&self, prior_uses: u32) -> Result<(), CouponRuleError> {
        if self.limit_for_same_user > 0 && prior_uses >= self.limit_for_same_user {
            Err(CouponRuleError::UserLimitReached {
                limit: self.limit_for_same_user,
            })
        } else {
            Ok(())
        }
    }

    /// Check the minimum purchase threshold against the items subtotal.
    ///
    /// # Errors
    ///
    /// `CouponRuleError::MinPurchaseNotMet` with the missing amount.
    pub fn check_min_purchase(&self, items_price: Decimal) -> Result<(), CouponRuleError> {
        if items_price >= self.min_purchase {
            Ok(())
        } else {
            Err(CouponRuleError::MinPurchaseNotMet {
                minimum: self.min_purchase,
                shortfall: round_money(self.min_purchase - items_price),
            })
        }
    }

    /// The discount this coupon grants on `items_price`, rounded to 2 places.
    #[must_use]
    pub fn discount_for(&self, items_price: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => items_price * self.discount_amount / Decimal::ONE_HUNDRED,
            DiscountType::FixedAmount => self.discount_amount,
        };

        let capped = if self.max_discount > Decimal::ZERO {
            raw.min(self.max_discount)
        } else {
            raw
        };

        round_money(capped.clamp(Decimal::ZERO, items_price.max(Decimal::ZERO)))
    }

    /// Whether the cap is reached after the usage counter was incremented.
    #[must_use]
    pub const fn cap_reached(&self) -> bool {
        self.max_total_uses > 0 && self.total_used >= self.max_total_uses
    }
}

/// Coupon details frozen onto an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedCoupon {
    pub coupon_id: CouponId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub discount_applied: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn save10() -> Coupon {
        let now = Utc::now();
        Coupon {
            id: CouponId::new(1),
            code: "SAVE10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_amount: Decimal::from(10),
            min_purchase: Decimal::from(100),
            max_discount: Decimal::from(15),
            start_date: now - Duration::days(1),
            expire_date: now + Duration::days(30),
            total_used: 0,
            max_total_uses: 0,
            limit_for_same_user: 1,
            is_active: true,
        }
    }

    fn new_coupon(discount_type: DiscountType, amount: i64) -> NewCoupon {
        let now = Utc::now();
        NewCoupon {
            code: "  monsoon ".to_string(),
            discount_type,
            discount_amount: Decimal::from(amount),
            min_purchase: Decimal::ZERO,
            max_discount: Decimal::from(50),
            start_date: now,
            expire_date: now + Duration::days(7),
            max_total_uses: 0,
            limit_for_same_user: 0,
        }
    }

    #[test]
    fn test_percentage_discount_is_clamped_to_cap() {
        assert_eq!(save10().discount_for(Decimal::from(200)), Decimal::from(15));
        assert_eq!(save10().discount_for(Decimal::from(120)), Decimal::from(12));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_items_price() {
        let mut flat = save10();
        flat.discount_type = DiscountType::FixedAmount;
        flat.discount_amount = Decimal::from(500);
        flat.max_discount = Decimal::ZERO;
        assert_eq!(flat.discount_for(Decimal::from(320)), Decimal::from(320));
        assert_eq!(flat.discount_for(Decimal::from(900)), Decimal::from(500));
    }

    #[test]
    fn test_min_purchase_reports_shortfall() {
        let err = save10().check_min_purchase(Decimal::new(7550, 2)).unwrap_err();
        assert_eq!(
            err,
            CouponRuleError::MinPurchaseNotMet {
                minimum: Decimal::from(100),
                shortfall: Decimal::new(2450, 2),
            }
        );
        assert!(err.to_string().contains("24.50"));
    }

    #[test]
    fn test_user_limit() {
        let coupon = save10();
        assert!(coupon.check_user_limit(0).is_ok());
        assert_eq!(
            coupon.check_user_limit(1),
            Err(CouponRuleError::UserLimitReached { limit: 1 })
        );
    }

    #[test]
    fn test_global_cap() {
        let mut coupon = save10();
        coupon.max_total_uses = 5;
        coupon.total_used = 4;
        assert!(coupon.check_global_cap().is_ok());
        coupon.total_used = 5;
        assert_eq!(coupon.check_global_cap(), Err(CouponRuleError::Exhausted));
        assert!(coupon.cap_reached());
    }

    #[test]
    fn test_window() {
        let coupon = save10();
        assert!(coupon.check_window(Utc::now()).is_ok());
        assert!(coupon.check_window(Utc::now() + Duration::days(60)).is_err());

        let mut inactive = save10();
        inactive.is_active = false;
        assert_eq!(inactive.check_window(Utc::now()), Err(CouponRuleError::OutsideWindow));
    }

    #[test]
    fn test_new_fixed_coupon_forces_zero_cap() {
        let coupon = new_coupon(DiscountType::FixedAmount, 75).validate().unwrap();
        assert_eq!(coupon.max_discount, Decimal::ZERO);
        assert_eq!(coupon.code, "MONSOON");
    }

    #[test]
    fn test_new_percentage_over_100_is_rejected() {
        assert!(matches!(
            new_coupon(DiscountType::Percentage, 101).validate(),
            Err(CouponDefinitionError::PercentageTooLarge(_))
        ));
        assert!(new_coupon(DiscountType::Percentage, 100).validate().is_ok());
    }

    #[test]
    fn test_new_coupon_window_must_not_be_inverted() {
        let mut coupon = new_coupon(DiscountType::Percentage, 10);
        coupon.expire_date = coupon.start_date - Duration::seconds(1);
        assert_eq!(
            coupon.validate().unwrap_err(),
            CouponDefinitionError::ExpiresBeforeStart
        );
    }

    #[test]
    fn test_new_coupon_rejects_blank_code_and_zero_discount() {
        let mut blank = new_coupon(DiscountType::Percentage, 10);
        blank.code = "   ".to_string();
        assert_eq!(blank.validate().unwrap_err(), CouponDefinitionError::EmptyCode);

        assert_eq!(
            new_coupon(DiscountType::FixedAmount, 0).validate().unwrap_err(),
            CouponDefinitionError::NonPositiveDiscount
        );
    }
}
