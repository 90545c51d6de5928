//! Order finalizer: the orchestration shared by cash and online orders.
//!
//! 1. Validate the delivery preference against the delivery option.
//! 2. Check delivery eligibility (home delivery) or resolve the store
//!    address (self pickup).
//! 3. Price the order from catalog data.
//! 4. Online only: reconcile the payment, then re-check eligibility.
//!    Completion arrives after the shopper has paid, so it prices and
//!    reconciles first and resolves the destination only once the capture is
//!    verified. Eligibility was already checked when the provider order was
//!    opened; any failure at completion is a critical failure.
//! 5. Persist the order with its frozen snapshots.
//! 6. Best-effort bookkeeping: stock, coupon usage, cart. Failures here are
//!    logged and never undo the order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use greenbasket_core::address::ShippingAddress;
use greenbasket_core::catalog::StockDecrement;
use greenbasket_core::coupon::AppliedCoupon;
use greenbasket_core::order::{
    DeliveryPreference, DeliveryPreferenceRequest, NewOrder, Order, OrderLine,
};
use greenbasket_core::pricing::{LineRequest, PriceBreakdown};
use greenbasket_core::types::{DeliveryOption, PaymentMethod, UserId};

use super::coupons::CouponLedger;
use super::eligibility::DeliveryEligibility;
use super::error::{CriticalCause, OrderError};
use super::pricing::{PricingEngine, Quote};
use super::reconciliation::{PaymentProof, PaymentReconciler};
use super::{ServiceSettings, Stores};
use crate::db::{CartStore, CatalogStore, OrderStore};

/// Order payload shared by the cash and online endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    /// Lines to order. When absent or empty the server-side cart is used.
    #[serde(default)]
    pub items: Option<Vec<LineRequest>>,
    pub shipping_address_id: Option<String>,
    pub delivery_option: DeliveryOption,
    pub delivery_preference: DeliveryPreferenceRequest,
    pub coupon_code: Option<String>,
}

/// Online order completion: the order payload plus the checkout proof.
#[derive(Debug, Clone, Deserialize)]
pub struct OnlineOrderRequest {
    #[serde(flatten)]
    pub order: OrderRequest,
    #[serde(flatten)]
    pub payment: PaymentProof,
}

/// What the checkout widget needs to take an online payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutIntent {
    pub provider_order_id: String,
    /// Amount in minor currency units.
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
    pub prices: PriceBreakdown,
}

/// Everything resolved before any payment step.
struct Prepared {
    lines: Vec<OrderLine>,
    prices: PriceBreakdown,
    coupon: Option<AppliedCoupon>,
    shipping_address: ShippingAddress,
    delivery_option: DeliveryOption,
    delivery_preference: DeliveryPreference,
}

impl Prepared {
    fn new(
        quote: Quote,
        shipping_address: ShippingAddress,
        delivery_option: DeliveryOption,
        delivery_preference: DeliveryPreference,
    ) -> Self {
        Self {
            lines: quote.lines,
            prices: quote.prices,
            coupon: quote.coupon,
            shipping_address,
            delivery_option,
            delivery_preference,
        }
    }

    fn into_new_order(self, user_id: UserId, payment_method: PaymentMethod) -> NewOrder {
        NewOrder {
            user_id,
            lines: self.lines,
            shipping_address: self.shipping_address,
            payment_method,
            payment_result: None,
            prices: self.prices,
            status: payment_method.initial_status(),
            delivery_option: self.delivery_option,
            delivery_preference: self.delivery_preference,
            coupon: self.coupon,
            is_paid: false,
            paid_at: None,
        }
    }
}

/// Creates orders.
#[derive(Clone)]
pub struct OrderFinalizer {
    eligibility: DeliveryEligibility,
    pricing: PricingEngine,
    coupons: CouponLedger,
    reconciler: PaymentReconciler,
    orders: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogStore>,
    carts: Arc<dyn CartStore>,
    store_address: Option<ShippingAddress>,
    payment_key_id: String,
}

impl OrderFinalizer {
    #[must_use]
    pub fn new(
        stores: &Stores,
        settings: &ServiceSettings,
        coupons: CouponLedger,
        reconciler: PaymentReconciler,
    ) -> Self {
        Self {
            eligibility: DeliveryEligibility::new(
                Arc::clone(&stores.addresses),
                settings.delivery_zone.clone(),
            ),
            pricing: PricingEngine::new(
                Arc::clone(&stores.catalog),
                coupons.clone(),
                settings.shipping,
            ),
            coupons,
            reconciler,
            orders: Arc::clone(&stores.orders),
            catalog: Arc::clone(&stores.catalog),
            carts: Arc::clone(&stores.carts),
            store_address: settings.store_address.clone(),
            payment_key_id: settings.payment_key_id.clone(),
        }
    }

    /// Place a cash-on-delivery order.
    ///
    /// # Errors
    ///
    /// Any validation, eligibility or pricing failure, or an `Internal`
    /// error if the order cannot be stored.
    #[instrument(skip(self, request), fields(user_id = %user_id, option = ?request.delivery_option))]
    pub async fn place_cod_order(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<Order, OrderError> {
        let now = Utc::now();
        let prepared = self.prepare(user_id, request, now).await?;
        let new_order = prepared.into_new_order(user_id, PaymentMethod::Cod);

        let order = self.orders.create_order(new_order).await?;
        info!(order_id = %order.id, total = %order.prices.total_price, "Cash order placed");

        self.settle_bookkeeping(&order).await;
        Ok(order)
    }

    /// Price the order and open a provider order for its total.
    ///
    /// # Errors
    ///
    /// Any validation, eligibility or pricing failure, or
    /// `ProviderUnreachable` when the provider order cannot be created.
    #[instrument(skip(self, request), fields(user_id = %user_id, option = ?request.delivery_option))]
    pub async fn begin_online_checkout(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<CheckoutIntent, OrderError> {
        let prepared = self.prepare(user_id, request, Utc::now()).await?;
        let provider_order = self
            .reconciler
            .create_provider_order(user_id, prepared.prices.total_price)
            .await?;

        Ok(CheckoutIntent {
            provider_order_id: provider_order.id,
            amount: provider_order.amount,
            currency: provider_order.currency,
            key_id: self.payment_key_id.clone(),
            prices: prepared.prices,
        })
    }

    /// Complete an online order after the shopper paid.
    ///
    /// # Errors
    ///
    /// Ordinary errors before the payment is verified. Once the payment is
    /// verified as captured, a failed destination check (eligibility, unknown
    /// address, missing store address) or a failed insert is returned as
    /// `OrderError::Critical`.
    #[instrument(
        skip(self, request),
        fields(
            user_id = %user_id,
            provider_order_id = %request.payment.provider_order_id,
            provider_payment_id = %request.payment.provider_payment_id,
        )
    )]
    pub async fn place_online_order(
        &self,
        user_id: UserId,
        request: &OnlineOrderRequest,
    ) -> Result<Order, OrderError> {
        let now = Utc::now();
        let order_request = &request.order;
        let delivery_preference = order_request
            .delivery_preference
            .validate(order_request.delivery_option)?;
        let quote = self.price(user_id, order_request, now).await?;

        let proof = &request.payment;
        let snapshot = self
            .reconciler
            .reconcile(proof, quote.prices.total_price)
            .await?;

        let shipping_address = self
            .destination(user_id, order_request)
            .await
            .map_err(|err| {
                error!(error = %err, "Delivery re-check failed after capture");
                OrderError::critical(
                    CriticalCause::Ineligible(err.to_string()),
                    &proof.provider_order_id,
                    &proof.provider_payment_id,
                )
            })?;

        let prepared = Prepared::new(
            quote,
            shipping_address,
            order_request.delivery_option,
            delivery_preference,
        );
        let mut new_order = prepared.into_new_order(user_id, PaymentMethod::Online);
        new_order.payment_result = Some(snapshot);
        new_order.is_paid = true;
        new_order.paid_at = Some(now);

        let order = self.orders.create_order(new_order).await.map_err(|err| {
            error!(error = %err, "Order insert failed after capture");
            OrderError::critical(
                CriticalCause::PersistenceFailed(err.to_string()),
                &proof.provider_order_id,
                &proof.provider_payment_id,
            )
        })?;
        info!(order_id = %order.id, total = %order.prices.total_price, "Online order placed");

        self.settle_bookkeeping(&order).await;
        Ok(order)
    }

    async fn prepare(
        &self,
        user_id: UserId,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Prepared, OrderError> {
        let option = request.delivery_option;
        let delivery_preference = request.delivery_preference.validate(option)?;
        let shipping_address = self.destination(user_id, request).await?;
        let quote = self.price(user_id, request, now).await?;

        Ok(Prepared::new(
            quote,
            shipping_address,
            option,
            delivery_preference,
        ))
    }

    /// The eligible home address, or the store address for pickup.
    async fn destination(
        &self,
        user_id: UserId,
        request: &OrderRequest,
    ) -> Result<ShippingAddress, OrderError> {
        let option = request.delivery_option;
        match option {
            DeliveryOption::HomeDelivery => {
                let address = self
                    .eligibility
                    .check(user_id, request.shipping_address_id.as_deref(), option)
                    .await?
                    .ok_or_else(|| {
                        OrderError::Internal("eligibility check returned no address".to_string())
                    })?;
                Ok(ShippingAddress::from(&address))
            }
            DeliveryOption::SelfPickup => self.store_address.clone().ok_or_else(|| {
                OrderError::ServerMisconfigured("store pickup address is not configured".to_string())
            }),
        }
    }

    async fn price(
        &self,
        user_id: UserId,
        request: &OrderRequest,
        now: DateTime<Utc>,
    ) -> Result<Quote, OrderError> {
        let cart;
        let requests: &[LineRequest] = match &request.items {
            Some(items) if !items.is_empty() => items,
            _ => {
                cart = self.carts.cart_lines(user_id).await?;
                &cart
            }
        };

        self.pricing
            .quote(
                user_id,
                requests,
                request.coupon_code.as_deref(),
                request.delivery_option,
                now,
            )
            .await
    }

    /// Stock, coupon usage and cart clearing for a stored order.
    async fn settle_bookkeeping(&self, order: &Order) {
        for line in &order.lines {
            match self.catalog.decrement_stock(line.item_id, line.quantity).await {
                Ok(StockDecrement::Applied { remaining }) => {
                    debug!(item_id = %line.item_id, remaining, "Stock decremented");
                }
                Ok(StockDecrement::Clamped { requested }) => {
                    warn!(
                        degraded = true,
                        order_id = %order.id,
                        item_id = %line.item_id,
                        requested,
                        "Stock would go negative, clamped at zero"
                    );
                }
                Ok(StockDecrement::Unmanaged) => {}
                Ok(StockDecrement::Missing) => {
                    warn!(order_id = %order.id, item_id = %line.item_id, "Ordered item no longer exists");
                }
                Err(err) => {
                    error!(order_id = %order.id, item_id = %line.item_id, error = %err, "Stock decrement failed");
                }
            }
        }

        if let Some(coupon) = &order.coupon {
            if let Err(err) = self.coupons.record_usage(coupon.coupon_id).await {
                error!(order_id = %order.id, code = %coupon.code, error = %err, "Coupon usage update failed");
            }
        }

        if let Err(err) = self.carts.clear_cart(order.user_id).await {
            error!(order_id = %order.id, error = %err, "Cart clear failed");
        }
    }
}

