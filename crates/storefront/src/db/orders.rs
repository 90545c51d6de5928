//! Order repository.
//!
//! Snapshots (lines, shipping address, payment result, delivery preference,
//! coupon) are stored as JSONB and written once at creation. Afterwards only
//! the status and paid/delivered columns are updated.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use greenbasket_core::order::{NewOrder, Order};
use greenbasket_core::pricing::PriceBreakdown;
use greenbasket_core::types::{DeliveryOption, OrderId, OrderStatus, PaymentMethod, UserId};

use super::{RepositoryError, from_json, to_json};

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a new order and return it with its assigned id.
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError>;

    /// Load an order by id.
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Write the mutable lifecycle fields of `order` back, provided the stored
    /// status is still `from`.
    ///
    /// Returns `Conflict` when another writer changed the status first.
    async fn save_lifecycle(
        &self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: i32,
    lines: serde_json::Value,
    shipping_address: serde_json::Value,
    payment_method: PaymentMethod,
    payment_result: Option<serde_json::Value>,
    items_price: Decimal,
    tax_price: Decimal,
    shipping_price: Decimal,
    discount_amount: Decimal,
    total_price: Decimal,
    status: OrderStatus,
    delivery_option: DeliveryOption,
    delivery_preference: serde_json::Value,
    coupon: Option<serde_json::Value>,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    is_delivered: bool,
    delivered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: OrderId::new(row.id),
            user_id: UserId::new(row.user_id),
            lines: from_json(row.lines, "lines")?,
            shipping_address: from_json(row.shipping_address, "shipping_address")?,
            payment_method: row.payment_method,
            payment_result: row
                .payment_result
                .map(|value| from_json(value, "payment_result"))
                .transpose()?,
            prices: PriceBreakdown {
                items_price: row.items_price,
                tax_price: row.tax_price,
                shipping_price: row.shipping_price,
                discount_amount: row.discount_amount,
                total_price: row.total_price,
            },
            status: row.status,
            delivery_option: row.delivery_option,
            delivery_preference: from_json(row.delivery_preference, "delivery_preference")?,
            coupon: row
                .coupon
                .map(|value| from_json(value, "coupon"))
                .transpose()?,
            is_paid: row.is_paid,
            paid_at: row.paid_at,
            is_delivered: row.is_delivered,
            delivered_at: row.delivered_at,
            created_at: row.created_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, user_id, lines, shipping_address, payment_method, \
                             payment_result, items_price, tax_price, shipping_price, \
                             discount_amount, total_price, status, delivery_option, \
                             delivery_preference, coupon, is_paid, paid_at, is_delivered, \
                             delivered_at, created_at";

/// `PostgreSQL` order repository.
#[derive(Debug, Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderRepository {
    async fn create_order(&self, order: NewOrder) -> Result<Order, RepositoryError> {
        let coupon_code = order.coupon.as_ref().map(|coupon| coupon.code.clone());
        let payment_result = order
            .payment_result
            .as_ref()
            .map(|payment| to_json(payment, "payment_result"))
            .transpose()?;
        let coupon = order
            .coupon
            .as_ref()
            .map(|coupon| to_json(coupon, "coupon"))
            .transpose()?;

        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            INSERT INTO storefront.order (
                user_id, lines, shipping_address, payment_method, payment_result,
                items_price, tax_price, shipping_price, discount_amount, total_price,
                status, delivery_option, delivery_preference, coupon, coupon_code,
                is_paid, paid_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(order.user_id.as_i32())
        .bind(to_json(&order.lines, "lines")?)
        .bind(to_json(&order.shipping_address, "shipping_address")?)
        .bind(order.payment_method)
        .bind(payment_result)
        .bind(order.prices.items_price)
        .bind(order.prices.tax_price)
        .bind(order.prices.shipping_price)
        .bind(order.prices.discount_amount)
        .bind(order.prices.total_price)
        .bind(order.status)
        .bind(order.delivery_option)
        .bind(to_json(&order.delivery_preference, "delivery_preference")?)
        .bind(coupon)
        .bind(coupon_code)
        .bind(order.is_paid)
        .bind(order.paid_at)
        .fetch_one(&self.pool)
        .await?;

        Order::try_from(row)
    }

    async fn find_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM storefront.order WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Order::try_from).transpose()
    }

    async fn save_lifecycle(
        &self,
        order: &Order,
        from: OrderStatus,
    ) -> Result<(), RepositoryError> {
        let payment_result = order
            .payment_result
            .as_ref()
            .map(|payment| to_json(payment, "payment_result"))
            .transpose()?;

        let result = sqlx::query(
            r"
            UPDATE storefront.order
            SET status = $2,
                is_paid = $3,
                paid_at = $4,
                payment_result = $5,
                is_delivered = $6,
                delivered_at = $7,
                updated_at = NOW()
            WHERE id = $1 AND status = $8
            ",
        )
        .bind(order.id.as_i32())
        .bind(order.status)
        .bind(order.is_paid)
        .bind(order.paid_at)
        .bind(payment_result)
        .bind(order.is_delivered)
        .bind(order.delivered_at)
        .bind(from)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "order {} is no longer {from}",
                order.id
            )));
        }

        Ok(())
    }
}
