//! Pricing engine: authoritative totals from catalog data.
//!
//! Client-supplied prices are never read. Items are loaded by id, lines are
//! frozen, the coupon is resolved against the real subtotal, and the
//! breakdown is computed by the pure rules in `greenbasket_core::pricing`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use greenbasket_core::coupon::AppliedCoupon;
use greenbasket_core::order::OrderLine;
use greenbasket_core::pricing::{LineRequest, PriceBreakdown, ShippingRule, price_lines};
use greenbasket_core::types::{DeliveryOption, ItemId, UserId};

use super::coupons::CouponLedger;
use super::error::OrderError;
use crate::db::CatalogStore;

/// A priced order, ready to be frozen onto an `Order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub lines: Vec<OrderLine>,
    pub prices: PriceBreakdown,
    pub coupon: Option<AppliedCoupon>,
}

/// Computes order totals.
#[derive(Clone)]
pub struct PricingEngine {
    catalog: Arc<dyn CatalogStore>,
    coupons: CouponLedger,
    shipping: ShippingRule,
}

impl PricingEngine {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogStore>, coupons: CouponLedger, shipping: ShippingRule) -> Self {
        Self {
            catalog,
            coupons,
            shipping,
        }
    }

    /// Price `requests` for `user_id`, applying `coupon_code` if given.
    ///
    /// # Errors
    ///
    /// `ItemsUnavailable`, `InvalidInput` (bad quantity or empty cart),
    /// `InsufficientStock`, or any coupon rule failure.
    #[instrument(skip(self, requests), fields(user_id = %user_id, lines = requests.len()))]
    pub async fn quote(
        &self,
        user_id: UserId,
        requests: &[LineRequest],
        coupon_code: Option<&str>,
        option: DeliveryOption,
        now: DateTime<Utc>,
    ) -> Result<Quote, OrderError> {
        let mut ids: Vec<ItemId> = requests.iter().map(|line| line.item_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let items = if ids.is_empty() {
            Vec::new()
        } else {
            self.catalog.find_items_by_ids(&ids).await?
        };
        let priced = price_lines(requests, &items)?;

        let code = coupon_code.map(str::trim).filter(|code| !code.is_empty());
        let coupon = match code {
            Some(code) => {
                let (_, applied) = self
                    .coupons
                    .resolve(user_id, code, priced.items_price, now)
                    .await?;
                Some(applied)
            }
            None => None,
        };

        let discount = coupon
            .as_ref()
            .map_or(Decimal::ZERO, |applied| applied.discount_applied);
        let prices = priced.finish(discount, option, &self.shipping);

        debug!(
            items_price = %prices.items_price,
            tax_price = %prices.tax_price,
            shipping_price = %prices.shipping_price,
            discount_amount = %prices.discount_amount,
            total_price = %prices.total_price,
            "Order priced"
        );

        Ok(Quote {
            lines: priced.lines,
            prices,
            coupon,
        })
    }
}
