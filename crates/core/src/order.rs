//! Orders and their frozen snapshots.
//!
//! An order is created once with copies of everything that could change
//! later (prices, tax rates, the shipping address, the coupon). After
//! creation only the status and the paid/delivered fields move, through
//! [`Order::transition`].

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::address::ShippingAddress;
use crate::catalog::Item;
use crate::coupon::AppliedCoupon;
use crate::pricing::PriceBreakdown;
use crate::types::{DeliveryOption, ItemId, OrderId, OrderStatus, PaymentMethod, UserId};

/// One ordered line, frozen at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: u32,
    /// Unit price at purchase.
    pub price: Decimal,
    pub cgst_rate: Decimal,
    pub sgst_rate: Decimal,
    pub taxable: bool,
    pub unit: Option<String>,
    pub image: Option<String>,
}

impl OrderLine {
    /// Copy the purchase-relevant fields of `item`.
    #[must_use]
    pub fn freeze(item: &Item, quantity: u32) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            quantity,
            price: item.price,
            cgst_rate: item.cgst_rate,
            sgst_rate: item.sgst_rate,
            taxable: item.taxable,
            unit: item.unit.clone(),
            image: item.image.clone(),
        }
    }

    /// `price * quantity`, unrounded.
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

/// What the payment provider reported for a captured payment.
///
/// The request signature is never part of this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentSnapshot {
    /// Provider payment id, or `COD-<order id>` for cash orders.
    pub id: String,
    pub status: String,
    pub update_time: DateTime<Utc>,
    pub email_address: Option<String>,
    pub method: Option<String>,
    pub description: Option<String>,
    pub provider_order_id: Option<String>,
}

impl PaymentSnapshot {
    /// Snapshot recorded when a cash order is handed over unpaid.
    #[must_use]
    pub fn cash_collected(order_id: OrderId, now: DateTime<Utc>) -> Self {
        Self {
            id: format!("COD-{order_id}"),
            status: "COMPLETED".to_string(),
            update_time: now,
            email_address: None,
            method: Some("cod".to_string()),
            description: Some("Cash collected on handover".to_string()),
            provider_order_id: None,
        }
    }
}

/// Delivery timing requested by the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferenceKind {
    /// Next available home-delivery run.
    Quick,
    /// Home delivery on a chosen date and slot.
    Scheduled,
    /// Collection from the store on a chosen date and slot.
    PickupScheduled,
}

/// Delivery preference as submitted, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPreferenceRequest {
    #[serde(rename = "type")]
    pub kind: PreferenceKind,
    pub date: Option<String>,
    pub time_slot: Option<String>,
}

/// A validated delivery preference as stored on the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPreference {
    #[serde(rename = "type")]
    pub kind: PreferenceKind,
    pub date: Option<NaiveDate>,
    pub time_slot: Option<String>,
}

/// Why a delivery preference was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreferenceError {
    #[error("{kind:?} is not available for {option:?}")]
    WrongOption {
        kind: PreferenceKind,
        option: DeliveryOption,
    },
    #[error("a scheduled delivery or pickup needs a date and a time slot")]
    MissingSchedule,
    #[error("invalid delivery date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
}

impl DeliveryPreferenceRequest {
    /// Check the preference shape against the delivery option.
    ///
    /// Home delivery accepts `quick` (date and slot are dropped) or
    /// `scheduled`; self-pickup accepts only `pickupScheduled`. Scheduled
    /// kinds need a parseable date and a non-blank slot.
    ///
    /// # Errors
    ///
    /// Returns `PreferenceError` describing the first problem found.
    pub fn validate(&self, option: DeliveryOption) -> Result<DeliveryPreference, PreferenceError> {
        let allowed = match option {
            DeliveryOption::HomeDelivery => {
                matches!(self.kind, PreferenceKind::Quick | PreferenceKind::Scheduled)
            }
            DeliveryOption::SelfPickup => self.kind == PreferenceKind::PickupScheduled,
        };
        if !allowed {
            return Err(PreferenceError::WrongOption {
                kind: self.kind,
                option,
            });
        }

        if self.kind == PreferenceKind::Quick {
            return Ok(DeliveryPreference {
                kind: PreferenceKind::Quick,
                date: None,
                time_slot: None,
            });
        }

        let date = self.date.as_deref().map(str::trim).filter(|d| !d.is_empty());
        let slot = self
            .time_slot
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let (Some(date), Some(slot)) = (date, slot) else {
            return Err(PreferenceError::MissingSchedule);
        };

        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| PreferenceError::InvalidDate(date.to_string()))?;

        Ok(DeliveryPreference {
            kind: self.kind,
            date: Some(date),
            time_slot: Some(slot.to_string()),
        })
    }
}

/// Everything needed to persist a new order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentSnapshot>,
    pub prices: PriceBreakdown,
    pub status: OrderStatus,
    pub delivery_option: DeliveryOption,
    pub delivery_preference: DeliveryPreference,
    pub coupon: Option<AppliedCoupon>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
}

/// A persisted order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub payment_result: Option<PaymentSnapshot>,
    pub prices: PriceBreakdown,
    pub status: OrderStatus,
    pub delivery_option: DeliveryOption,
    pub delivery_preference: DeliveryPreference,
    pub coupon: Option<AppliedCoupon>,
    pub is_paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub is_delivered: bool,
    pub delivered_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materialize a draft with the id and timestamp assigned by storage.
    #[must_use]
    pub fn from_new(id: OrderId, new: NewOrder, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            lines: new.lines,
            shipping_address: new.shipping_address,
            payment_method: new.payment_method,
            payment_result: new.payment_result,
            prices: new.prices,
            status: new.status,
            delivery_option: new.delivery_option,
            delivery_preference: new.delivery_preference,
            coupon: new.coupon,
            is_paid: new.is_paid,
            paid_at: new.paid_at,
            is_delivered: false,
            delivered_at: None,
            created_at,
        }
    }

    /// Move the order to `to`.
    ///
    /// Repeating the current status is accepted and changes nothing.
    /// Reaching a handover status marks the order delivered (the timestamp
    /// is only set the first time) and, for unpaid cash orders, paid.
    ///
    /// # Errors
    ///
    /// `TransitionError::Terminal` when the order is already final and
    /// `TransitionError::NotAllowed` for an edge outside the lifecycle.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<Transition, TransitionError> {
        let from = self.status;
        if from == to {
            return Ok(Transition::Unchanged);
        }
        if from.is_terminal() {
            return Err(TransitionError::Terminal(from));
        }
        if !from.can_transition_to(to, self.delivery_option) {
            return Err(TransitionError::NotAllowed {
                from,
                to,
                option: self.delivery_option,
            });
        }

        self.status = to;

        if to.is_handed_over() {
            self.is_delivered = true;
            self.delivered_at.get_or_insert(now);

            if self.payment_method == PaymentMethod::Cod && !self.is_paid {
                self.is_paid = true;
                self.paid_at = Some(now);
                self.payment_result = Some(PaymentSnapshot::cash_collected(self.id, now));
            }
        }

        Ok(Transition::Changed { from })
    }
}

/// Result of a successful [`Order::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Changed { from: OrderStatus },
    Unchanged,
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("order is already {0} and cannot change status")]
    Terminal(OrderStatus),
    #[error("cannot move a {option:?} order from {from} to {to}")]
    NotAllowed {
        from: OrderStatus,
        to: OrderStatus,
        option: DeliveryOption,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            full_name: "Store Pickup".to_string(),
            phone: "020 0000 0000".to_string(),
            line1: "1 Market Yard".to_string(),
            line2: None,
            landmark: None,
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            postal_code: "411037".to_string(),
            country: "India".to_string(),
            latitude: None,
            longitude: None,
        }
    }

    fn order(method: PaymentMethod, option: DeliveryOption, status: OrderStatus) -> Order {
        let created = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        Order::from_new(
            OrderId::new(42),
            NewOrder {
                user_id: UserId::new(7),
                lines: Vec::new(),
                shipping_address: shipping(),
                payment_method: method,
                payment_result: None,
                prices: PriceBreakdown {
                    items_price: Decimal::from(200),
                    tax_price: Decimal::from(36),
                    shipping_price: Decimal::from(50),
                    discount_amount: Decimal::ZERO,
                    total_price: Decimal::from(286),
                },
                status,
                delivery_option: option,
                delivery_preference: DeliveryPreference {
                    kind: PreferenceKind::Quick,
                    date: None,
                    time_slot: None,
                },
                coupon: None,
                is_paid: method == PaymentMethod::Online,
                paid_at: None,
            },
            created,
        )
    }

    #[test]
    fn test_delivered_sets_timestamp_once() {
        let mut order = order(
            PaymentMethod::Online,
            DeliveryOption::HomeDelivery,
            OrderStatus::OutForDelivery,
        );
        let first = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2026, 3, 3, 10, 0, 0).unwrap();

        let result = order.transition(OrderStatus::Delivered, first).unwrap();
        assert_eq!(
            result,
            Transition::Changed {
                from: OrderStatus::OutForDelivery
            }
        );
        assert!(order.is_delivered);
        assert_eq!(order.delivered_at, Some(first));

        let again = order.transition(OrderStatus::Delivered, second).unwrap();
        assert_eq!(again, Transition::Unchanged);
        assert_eq!(order.delivered_at, Some(first));
    }

    #[test]
    fn test_cod_pickup_is_marked_paid() {
        let mut order = order(
            PaymentMethod::Cod,
            DeliveryOption::SelfPickup,
            OrderStatus::ReadyForPickup,
        );
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 17, 30, 0).unwrap();

        order.transition(OrderStatus::PickedUp, now).unwrap();

        assert!(order.is_paid);
        assert_eq!(order.paid_at, Some(now));
        let payment = order.payment_result.unwrap();
        assert_eq!(payment.id, "COD-42");
        assert_eq!(payment.status, "COMPLETED");
        assert_eq!(payment.method.as_deref(), Some("cod"));
    }

    #[test]
    fn test_paid_online_order_keeps_provider_snapshot() {
        let mut order = order(
            PaymentMethod::Online,
            DeliveryOption::HomeDelivery,
            OrderStatus::OutForDelivery,
        );
        order.transition(OrderStatus::Delivered, Utc::now()).unwrap();
        assert!(order.payment_result.is_none());
    }

    #[test]
    fn test_terminal_order_rejects_change() {
        let mut order = order(
            PaymentMethod::Cod,
            DeliveryOption::HomeDelivery,
            OrderStatus::Cancelled,
        );
        assert_eq!(
            order.transition(OrderStatus::Processing, Utc::now()),
            Err(TransitionError::Terminal(OrderStatus::Cancelled))
        );
    }

    #[test]
    fn test_pickup_order_cannot_ship() {
        let mut order = order(
            PaymentMethod::Cod,
            DeliveryOption::SelfPickup,
            OrderStatus::Processing,
        );
        assert!(matches!(
            order.transition(OrderStatus::Shipped, Utc::now()),
            Err(TransitionError::NotAllowed { .. })
        ));
        assert_eq!(order.status, OrderStatus::Processing);
    }

    fn request(kind: PreferenceKind, date: Option<&str>, slot: Option<&str>) -> DeliveryPreferenceRequest {
        DeliveryPreferenceRequest {
            kind,
            date: date.map(str::to_string),
            time_slot: slot.map(str::to_string),
        }
    }

    #[test]
    fn test_quick_delivery_drops_schedule() {
        let preference = request(PreferenceKind::Quick, Some("2026-03-04"), Some("9-11"))
            .validate(DeliveryOption::HomeDelivery)
            .unwrap();
        assert_eq!(preference.date, None);
        assert_eq!(preference.time_slot, None);
    }

    #[test]
    fn test_scheduled_needs_date_and_slot() {
        let home = DeliveryOption::HomeDelivery;
        assert_eq!(
            request(PreferenceKind::Scheduled, Some("2026-03-04"), None).validate(home),
            Err(PreferenceError::MissingSchedule)
        );
        assert_eq!(
            request(PreferenceKind::Scheduled, Some("  "), Some("9-11")).validate(home),
            Err(PreferenceError::MissingSchedule)
        );
        assert_eq!(
            request(PreferenceKind::Scheduled, Some("04/03/2026"), Some("9-11")).validate(home),
            Err(PreferenceError::InvalidDate("04/03/2026".to_string()))
        );

        let ok = request(PreferenceKind::Scheduled, Some("2026-03-04"), Some(" 9-11 "))
            .validate(home)
            .unwrap();
        assert_eq!(ok.date, NaiveDate::from_ymd_opt(2026, 3, 4));
        assert_eq!(ok.time_slot.as_deref(), Some("9-11"));
    }

    #[test]
    fn test_preference_must_match_delivery_option() {
        assert!(matches!(
            request(PreferenceKind::Quick, None, None).validate(DeliveryOption::SelfPickup),
            Err(PreferenceError::WrongOption { .. })
        ));
        assert!(matches!(
            request(PreferenceKind::PickupScheduled, Some("2026-03-04"), Some("17-19"))
                .validate(DeliveryOption::HomeDelivery),
            Err(PreferenceError::WrongOption { .. })
        ));
        assert!(
            request(PreferenceKind::PickupScheduled, Some("2026-03-04"), Some("17-19"))
                .validate(DeliveryOption::SelfPickup)
                .is_ok()
        );
    }

    #[test]
    fn test_preference_wire_format() {
        let parsed: DeliveryPreferenceRequest =
            serde_json::from_str(r#"{"type":"pickupScheduled","date":"2026-03-04","timeSlot":"17-19"}"#)
                .unwrap();
        assert_eq!(parsed.kind, PreferenceKind::PickupScheduled);
        assert_eq!(parsed.time_slot.as_deref(), Some("17-19"));
    }
}
