//! Status enums for orders and checkout choices.
//!
//! Order lifecycle:
//!
//! ```text
//! Pending ─┬─> Confirmed ──────────┐
//!          ├─> Payment Processing ─┼─> Processing ─┬─> Shipped ─> Out For Delivery ─> Delivered
//!          └─> Payment Failed ─────┘               └─> Ready for Pickup ─> Picked Up
//!
//! any non-terminal state ─> Cancelled | Failed to Deliver | Refunded
//! ```
//!
//! The wire and database spelling of each status is its display name
//! (`"Out For Delivery"`), which is what the order history has always stored.

use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "storefront.order_status"))]
pub enum OrderStatus {
    #[default]
    #[serde(rename = "Pending")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Pending"))]
    Pending,
    #[serde(rename = "Confirmed")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Confirmed"))]
    Confirmed,
    #[serde(rename = "Payment Processing")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Payment Processing"))]
    PaymentProcessing,
    #[serde(rename = "Payment Failed")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Payment Failed"))]
    PaymentFailed,
    #[serde(rename = "Processing")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Processing"))]
    Processing,
    #[serde(rename = "Shipped")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Shipped"))]
    Shipped,
    #[serde(rename = "Out For Delivery")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Out For Delivery"))]
    OutForDelivery,
    #[serde(rename = "Delivered")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Delivered"))]
    Delivered,
    #[serde(rename = "Ready for Pickup")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Ready for Pickup"))]
    ReadyForPickup,
    #[serde(rename = "Picked Up")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Picked Up"))]
    PickedUp,
    #[serde(rename = "Cancelled")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Cancelled"))]
    Cancelled,
    #[serde(rename = "Failed to Deliver")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Failed to Deliver"))]
    FailedToDeliver,
    #[serde(rename = "Refunded")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Refunded"))]
    Refunded,
}

impl OrderStatus {
    /// Statuses whose orders do not count toward a shopper's coupon usage.
    pub const COUPON_EXEMPT: [Self; 3] = [Self::Cancelled, Self::PaymentFailed, Self::Refunded];

    /// Display name, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::PaymentProcessing => "Payment Processing",
            Self::PaymentFailed => "Payment Failed",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::OutForDelivery => "Out For Delivery",
            Self::Delivered => "Delivered",
            Self::ReadyForPickup => "Ready for Pickup",
            Self::PickedUp => "Picked Up",
            Self::Cancelled => "Cancelled",
            Self::FailedToDeliver => "Failed to Deliver",
            Self::Refunded => "Refunded",
        }
    }

    /// Terminal statuses accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Delivered | Self::PickedUp | Self::Cancelled | Self::Refunded | Self::FailedToDeliver
        )
    }

    /// Statuses that mean the goods reached the shopper.
    #[must_use]
    pub const fn is_handed_over(self) -> bool {
        matches!(self, Self::Delivered | Self::PickedUp)
    }

    /// Whether `self -> next` is an edge of the lifecycle for an order with the
    /// given delivery option. Repeating the current status is not an edge.
    #[must_use]
    pub fn can_transition_to(self, next: Self, option: DeliveryOption) -> bool {
        if self.is_terminal() || self == next {
            return false;
        }

        if matches!(next, Self::Cancelled | Self::FailedToDeliver | Self::Refunded) {
            return true;
        }

        let home = option == DeliveryOption::HomeDelivery;
        match (self, next) {
            (Self::Pending, Self::Confirmed | Self::PaymentProcessing | Self::PaymentFailed)
            | (Self::PaymentProcessing, Self::Confirmed | Self::PaymentFailed)
            | (Self::Confirmed | Self::PaymentProcessing | Self::PaymentFailed, Self::Processing) => {
                true
            }
            (Self::Processing, Self::Shipped)
            | (Self::Shipped, Self::OutForDelivery)
            | (Self::OutForDelivery, Self::Delivered) => home,
            (Self::Processing, Self::ReadyForPickup) | (Self::ReadyForPickup, Self::PickedUp) => {
                !home
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [OrderStatus; 13] = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::PaymentProcessing,
            OrderStatus::PaymentFailed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::ReadyForPickup,
            OrderStatus::PickedUp,
            OrderStatus::Cancelled,
            OrderStatus::FailedToDeliver,
            OrderStatus::Refunded,
        ];
        ALL.into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// How the shopper pays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "storefront.payment_method"))]
pub enum PaymentMethod {
    /// Cash on delivery (or at pickup).
    #[serde(rename = "COD")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "COD"))]
    Cod,
    /// Captured up front through the payment provider.
    #[serde(rename = "Online")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "Online"))]
    Online,
}

impl PaymentMethod {
    /// Initial order status right after creation.
    #[must_use]
    pub const fn initial_status(self) -> OrderStatus {
        match self {
            Self::Cod => OrderStatus::Pending,
            Self::Online => OrderStatus::Confirmed,
        }
    }
}

/// How the goods reach the shopper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.delivery_option", rename_all = "camelCase")
)]
#[serde(rename_all = "camelCase")]
pub enum DeliveryOption {
    HomeDelivery,
    SelfPickup,
}
