//! Coupon repository.
//!
//! Usage counters are changed with single atomic statements; nothing here
//! reads a counter and writes it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use greenbasket_core::coupon::{Coupon, DiscountType, NewCoupon};
use greenbasket_core::types::{CouponId, OrderStatus, UserId};

use super::RepositoryError;

/// Coupon operations used by the coupon ledger and coupon admin.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// An active coupon whose window contains `now`, matched case-insensitively.
    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, RepositoryError>;

    /// Insert a validated coupon definition.
    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError>;

    /// Atomically add one to `total_used` and return the updated coupon.
    async fn increment_usage(&self, id: CouponId) -> Result<Coupon, RepositoryError>;

    /// How many of the user's orders carry `code`, ignoring the given statuses.
    async fn count_user_orders_with_coupon(
        &self,
        user_id: UserId,
        code: &str,
        excluded: &[OrderStatus],
    ) -> Result<u32, RepositoryError>;

    /// Mark the coupon inactive.
    async fn deactivate(&self, id: CouponId) -> Result<(), RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct CouponRow {
    id: i32,
    code: String,
    discount_type: DiscountType,
    discount_amount: Decimal,
    min_purchase: Decimal,
    max_discount: Decimal,
    start_date: DateTime<Utc>,
    expire_date: DateTime<Utc>,
    total_used: i32,
    max_total_uses: i32,
    limit_for_same_user: i32,
    is_active: bool,
}

fn counter(value: i32, column: &str) -> Result<u32, RepositoryError> {
    u32::try_from(value)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative {column}: {value}")))
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl TryFrom<CouponRow> for Coupon {
    type Error = RepositoryError;

    fn try_from(row: CouponRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: CouponId::new(row.id),
            code: row.code,
            discount_type: row.discount_type,
            discount_amount: row.discount_amount,
            min_purchase: row.min_purchase,
            max_discount: row.max_discount,
            start_date: row.start_date,
            expire_date: row.expire_date,
            total_used: counter(row.total_used, "total_used")?,
            max_total_uses: counter(row.max_total_uses, "max_total_uses")?,
            limit_for_same_user: counter(row.limit_for_same_user, "limit_for_same_user")?,
            is_active: row.is_active,
        })
    }
}

const COUPON_COLUMNS: &str = "id, code, discount_type, discount_amount, min_purchase, \
                              max_discount, start_date, expire_date, total_used, \
                              max_total_uses, limit_for_same_user, is_active";

/// `PostgreSQL` coupon repository.
#[derive(Debug, Clone)]
pub struct PgCouponRepository {
    pool: PgPool,
}

impl PgCouponRepository {
    /// Create a new coupon repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CouponStore for PgCouponRepository {
    async fn find_active_by_code(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Coupon>, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            SELECT {COUPON_COLUMNS}
            FROM storefront.coupon
            WHERE UPPER(code) = UPPER($1)
              AND is_active
              AND start_date <= $2
              AND expire_date >= $2
            "
        ))
        .bind(code.trim())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Coupon::try_from).transpose()
    }

    async fn create_coupon(&self, coupon: NewCoupon) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            INSERT INTO storefront.coupon (
                code, discount_type, discount_amount, min_purchase, max_discount,
                start_date, expire_date, max_total_uses, limit_for_same_user
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(&coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_amount)
        .bind(coupon.min_purchase)
        .bind(coupon.max_discount)
        .bind(coupon.start_date)
        .bind(coupon.expire_date)
        .bind(to_i32(coupon.max_total_uses))
        .bind(to_i32(coupon.limit_for_same_user))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| RepositoryError::from_unique(e, "coupon code"))?;

        Coupon::try_from(row)
    }

    async fn increment_usage(&self, id: CouponId) -> Result<Coupon, RepositoryError> {
        let row = sqlx::query_as::<_, CouponRow>(&format!(
            r"
            UPDATE storefront.coupon
            SET total_used = total_used + 1
            WHERE id = $1
            RETURNING {COUPON_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Coupon::try_from(row)
    }

    async fn count_user_orders_with_coupon(
        &self,
        user_id: UserId,
        code: &str,
        excluded: &[OrderStatus],
    ) -> Result<u32, RepositoryError> {
        let excluded: Vec<&str> = excluded.iter().map(|status| status.as_str()).collect();

        let count: i64 = sqlx::query_scalar(
            r"
            SELECT COUNT(*)
            FROM storefront.order
            WHERE user_id = $1
              AND UPPER(coupon_code) = UPPER($2)
              AND status::text <> ALL($3::text[])
            ",
        )
        .bind(user_id.as_i32())
        .bind(code.trim())
        .bind(&excluded)
        .fetch_one(&self.pool)
        .await?;

        u32::try_from(count)
            .map_err(|_| RepositoryError::DataCorruption(format!("order count out of range: {count}")))
    }

    async fn deactivate(&self, id: CouponId) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE storefront.coupon SET is_active = FALSE WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
