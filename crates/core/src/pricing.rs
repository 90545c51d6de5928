//! Order price computation.
//!
//! Pricing happens in two phases so the coupon can be resolved against the
//! authoritative items subtotal in between:
//!
//! 1. [`price_lines`] checks availability, quantities and stock against the
//!    loaded catalog items and freezes one [`OrderLine`] per request line.
//! 2. [`LinePricing::finish`] applies the discount, apportions it across
//!    taxable lines, computes tax and shipping, and produces the
//!    [`PriceBreakdown`].
//!
//! Each figure is rounded to 2 decimal places before it is summed.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::Item;
use crate::order::OrderLine;
use crate::types::{DeliveryOption, ItemId, round_money};

/// One requested line: which item and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub item_id: ItemId,
    pub quantity: i64,
}

/// Flat delivery fee with an optional free-delivery threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingRule {
    pub delivery_fee: Decimal,
    /// When set, the fee is waived once `subtotal after discount + tax`
    /// reaches this amount.
    pub free_delivery_threshold: Option<Decimal>,
}

impl ShippingRule {
    /// The fee for an order whose discounted subtotal plus tax is `payable`.
    #[must_use]
    pub fn fee(&self, option: DeliveryOption, payable: Decimal) -> Decimal {
        if option == DeliveryOption::SelfPickup {
            return Decimal::ZERO;
        }

        match self.free_delivery_threshold {
            Some(threshold) if payable >= threshold => Decimal::ZERO,
            _ => round_money(self.delivery_fee.max(Decimal::ZERO)),
        }
    }
}

/// Why a cart could not be priced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("the cart is empty")]
    EmptyCart,
    #[error("some items are no longer available: {0:?}")]
    ItemsUnavailable(Vec<ItemId>),
    #[error("quantity for {item_id} must be a positive whole number, got {quantity}")]
    InvalidQuantity { item_id: ItemId, quantity: i64 },
    #[error("only {available} of {name} left in stock")]
    InsufficientStock {
        item_id: ItemId,
        name: String,
        available: i32,
    },
}

/// Authoritative totals for an order.
///
/// `total_price = max(0, items_price - discount_amount + tax_price + shipping_price)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub items_price: Decimal,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub discount_amount: Decimal,
    pub total_price: Decimal,
}

/// Result of phase one: frozen lines and their subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePricing {
    pub lines: Vec<OrderLine>,
    pub items_price: Decimal,
}

/// Validate the requested lines against the loaded catalog and freeze them.
///
/// Request lines naming the same item are merged. `items` may contain
/// inactive records; those are reported as unavailable.
///
/// # Errors
///
/// `PricingError::EmptyCart` for no lines, `ItemsUnavailable` listing every
/// missing or inactive id, `InvalidQuantity` for non-positive or overflowing
/// quantities, and `InsufficientStock` for the first managed item without
/// enough stock.
pub fn price_lines(requests: &[LineRequest], items: &[Item]) -> Result<LinePricing, PricingError> {
    if requests.is_empty() {
        return Err(PricingError::EmptyCart);
    }

    let catalog: BTreeMap<ItemId, &Item> = items
        .iter()
        .filter(|item| item.is_active)
        .map(|item| (item.id, item))
        .collect();

    let mut merged: Vec<(ItemId, i64)> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity <= 0 {
            return Err(PricingError::InvalidQuantity {
                item_id: request.item_id,
                quantity: request.quantity,
            });
        }
        match merged.iter_mut().find(|(id, _)| *id == request.item_id) {
            Some((_, quantity)) => {
                *quantity = quantity.checked_add(request.quantity).ok_or(
                    PricingError::InvalidQuantity {
                        item_id: request.item_id,
                        quantity: request.quantity,
                    },
                )?;
            }
            None => merged.push((request.item_id, request.quantity)),
        }
    }

    let missing: Vec<ItemId> = merged
        .iter()
        .map(|(id, _)| *id)
        .filter(|id| !catalog.contains_key(id))
        .collect();
    if !missing.is_empty() {
        return Err(PricingError::ItemsUnavailable(missing));
    }

    let mut lines = Vec::with_capacity(merged.len());
    let mut items_price = Decimal::ZERO;

    for (item_id, quantity) in merged {
        let Some(item) = catalog.get(&item_id) else {
            continue;
        };

        let quantity = u32::try_from(quantity)
            .map_err(|_| PricingError::InvalidQuantity { item_id, quantity })?;

        if !item.can_fulfil(quantity) {
            return Err(PricingError::InsufficientStock {
                item_id,
                name: item.name.clone(),
                available: item.stock.max(0),
            });
        }

        let line = OrderLine::freeze(item, quantity);
        items_price += line.subtotal();
        lines.push(line);
    }

    Ok(LinePricing {
        lines,
        items_price: round_money(items_price),
    })
}

impl LinePricing {
    /// Tax on the discounted value of every taxable line.
    ///
    /// The discount is apportioned to each line by its share of
    /// `items_price`; a line's taxable value never goes below zero.
    #[must_use]
    pub fn tax(&self, discount: Decimal) -> Decimal {
        if self.items_price <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let tax: Decimal = self
            .lines
            .iter()
            .filter(|line| line.taxable)
            .map(|line| {
                let subtotal = line.subtotal();
                let share = subtotal / self.items_price * discount;
                let taxable_value = (subtotal - share).max(Decimal::ZERO);
                taxable_value * (line.cgst_rate + line.sgst_rate) / Decimal::ONE_HUNDRED
            })
            .sum();

        round_money(tax)
    }

    /// Apply the discount, tax and shipping.
    ///
    /// `discount` is clamped to `[0, items_price]` before use.
    #[must_use]
    pub fn finish(
        &self,
        discount: Decimal,
        option: DeliveryOption,
        shipping: &ShippingRule,
    ) -> PriceBreakdown {
        let items_price = self.items_price;
        let discount_amount = round_money(discount.clamp(Decimal::ZERO, items_price));
        let after_discount = round_money(items_price - discount_amount);
        let tax_price = self.tax(discount_amount);
        let shipping_price = shipping.fee(option, after_discount + tax_price);
        let total_price = round_money(after_discount + tax_price + shipping_price).max(Decimal::ZERO);

        PriceBreakdown {
            items_price,
            tax_price,
            shipping_price,
            discount_amount,
            total_price,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn item(id: i32, price: i64, stock: i32, taxable: bool) -> Item {
        Item {
            id: ItemId::new(id),
            category_id: None,
            name: format!("Item {id}"),
            price: Decimal::from(price),
            unit: None,
            stock,
            manage_stock: true,
            is_active: true,
            taxable,
            cgst_rate: Decimal::from(9),
            sgst_rate: Decimal::from(9),
            image: None,
        }
    }

    fn request(id: i32, quantity: i64) -> LineRequest {
        LineRequest {
            item_id: ItemId::new(id),
            quantity,
        }
    }

    const SHIPPING: ShippingRule = ShippingRule {
        delivery_fee: Decimal::from_parts(50, 0, 0, false, 0),
        free_delivery_threshold: Some(Decimal::from_parts(1000, 0, 0, false, 0)),
    };

    #[test]
    fn test_reference_cart_without_coupon() {
        let priced = price_lines(&[request(1, 2)], &[item(1, 100, 10, true)]).unwrap();
        let totals = priced.finish(Decimal::ZERO, DeliveryOption::HomeDelivery, &SHIPPING);

        assert_eq!(totals.items_price, Decimal::from(200));
        assert_eq!(totals.tax_price, Decimal::from(36));
        assert_eq!(totals.shipping_price, Decimal::from(50));
        assert_eq!(totals.discount_amount, Decimal::ZERO);
        assert_eq!(totals.total_price, Decimal::from(286));
    }

    #[test]
    fn test_discount_is_apportioned_before_tax() {
        let items = [item(1, 100, 10, true), item(2, 100, 10, false)];
        let priced = price_lines(&[request(1, 1), request(2, 1)], &items).unwrap();
        let totals = priced.finish(Decimal::from(20), DeliveryOption::SelfPickup, &SHIPPING);

        // Taxable line: 100 - (100/200 * 20) = 90, tax 18% = 16.20
        assert_eq!(totals.tax_price, Decimal::new(1620, 2));
        assert_eq!(totals.shipping_price, Decimal::ZERO);
        assert_eq!(totals.total_price, Decimal::new(19_620, 2));
    }

    #[test]
    fn test_free_delivery_threshold_uses_discounted_total_with_tax() {
        let priced = price_lines(&[request(1, 9)], &[item(1, 100, 10, true)]).unwrap();
        // 900 + 162 tax = 1062 >= 1000
        let totals = priced.finish(Decimal::ZERO, DeliveryOption::HomeDelivery, &SHIPPING);
        assert_eq!(totals.shipping_price, Decimal::ZERO);

        // 900 - 100 = 800 + 144 tax = 944 < 1000
        let totals = priced.finish(Decimal::from(100), DeliveryOption::HomeDelivery, &SHIPPING);
        assert_eq!(totals.shipping_price, Decimal::from(50));
    }

    #[test]
    fn test_missing_threshold_never_waives_fee() {
        let rule = ShippingRule {
            delivery_fee: Decimal::from(40),
            free_delivery_threshold: None,
        };
        assert_eq!(
            rule.fee(DeliveryOption::HomeDelivery, Decimal::from(100_000)),
            Decimal::from(40)
        );
        assert_eq!(rule.fee(DeliveryOption::SelfPickup, Decimal::ONE), Decimal::ZERO);
    }

    #[test]
    fn test_total_is_never_negative_and_matches_parts() {
        let priced = price_lines(&[request(1, 1)], &[item(1, 100, 10, true)]).unwrap();
        let totals = priced.finish(Decimal::from(5000), DeliveryOption::SelfPickup, &SHIPPING);

        assert_eq!(totals.discount_amount, Decimal::from(100));
        assert_eq!(totals.total_price, Decimal::ZERO);
        assert_eq!(
            totals.total_price,
            round_money(
                totals.items_price - totals.discount_amount + totals.tax_price + totals.shipping_price
            )
        );
    }

    #[test]
    fn test_unavailable_items_are_all_reported() {
        let mut inactive = item(2, 10, 10, false);
        inactive.is_active = false;
        let err = price_lines(
            &[request(1, 1), request(2, 1), request(3, 1)],
            &[item(1, 10, 10, false), inactive],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PricingError::ItemsUnavailable(vec![ItemId::new(2), ItemId::new(3)])
        );
    }

    #[test]
    fn test_insufficient_stock_names_item_and_available() {
        let err = price_lines(&[request(1, 4)], &[item(1, 10, 3, false)]).unwrap_err();
        assert_eq!(
            err,
            PricingError::InsufficientStock {
                item_id: ItemId::new(1),
                name: "Item 1".to_string(),
                available: 3,
            }
        );
    }

    #[test]
    fn test_unmanaged_stock_is_unlimited() {
        let mut unlimited = item(1, 10, 0, false);
        unlimited.manage_stock = false;
        assert!(price_lines(&[request(1, 250)], &[unlimited]).is_ok());
    }

    #[test]
    fn test_duplicate_lines_are_merged_before_stock_check() {
        let err = price_lines(&[request(1, 2), request(1, 2)], &[item(1, 10, 3, false)]).unwrap_err();
        assert!(matches!(err, PricingError::InsufficientStock { available: 3, .. }));

        let priced = price_lines(&[request(1, 1), request(1, 2)], &[item(1, 10, 3, false)]).unwrap();
        assert_eq!(priced.lines.len(), 1);
        assert_eq!(priced.items_price, Decimal::from(30));
    }

    #[test]
    fn test_non_positive_quantity_is_rejected() {
        assert!(matches!(
            price_lines(&[request(1, 0)], &[item(1, 10, 3, false)]),
            Err(PricingError::InvalidQuantity { quantity: 0, .. })
        ));
        assert!(matches!(
            price_lines(&[request(1, -2)], &[item(1, 10, 3, false)]),
            Err(PricingError::InvalidQuantity { quantity: -2, .. })
        ));
    }

    #[test]
    fn test_merged_quantity_overflow_is_rejected() {
        let lines = [request(1, i64::MAX), request(1, i64::MAX), request(1, 4)];
        assert!(matches!(
            price_lines(&lines, &[item(1, 10, 3, false)]),
            Err(PricingError::InvalidQuantity { quantity: i64::MAX, .. })
        ));

        // Sums past u32 but within i64 are still rejected before pricing.
        let lines = [request(1, i64::from(u32::MAX)), request(1, 1)];
        assert!(matches!(
            price_lines(&lines, &[item(1, 10, 3, false)]),
            Err(PricingError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        assert_eq!(price_lines(&[], &[]), Err(PricingError::EmptyCart));
    }

    #[test]
    fn test_fractional_tax_is_rounded_once() {
        let mut odd = item(1, 0, 10, true);
        odd.price = Decimal::new(3333, 2);
        odd.cgst_rate = Decimal::new(25, 1);
        odd.sgst_rate = Decimal::new(25, 1);
        let priced = price_lines(&[request(1, 3)], &[odd]).unwrap();
        // 99.99 * 5% = 4.9995 -> 5.00
        assert_eq!(priced.tax(Decimal::ZERO), Decimal::new(500, 2));
    }
}
