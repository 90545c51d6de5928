//! Cart repository.

use async_trait::async_trait;
use sqlx::PgPool;

use greenbasket_core::pricing::LineRequest;
use greenbasket_core::types::{ItemId, UserId};

use super::RepositoryError;

/// Server-side cart operations.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The user's current cart lines.
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<LineRequest>, RepositoryError>;

    /// Remove every line from the user's cart.
    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError>;
}

/// `PostgreSQL` cart repository.
#[derive(Debug, Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    /// Create a new cart repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartStore for PgCartRepository {
    async fn cart_lines(&self, user_id: UserId) -> Result<Vec<LineRequest>, RepositoryError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            "SELECT item_id, quantity FROM storefront.cart_item WHERE user_id = $1 ORDER BY item_id",
        )
        .bind(user_id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(item_id, quantity)| LineRequest {
                item_id: ItemId::new(item_id),
                quantity: i64::from(quantity),
            })
            .collect())
    }

    async fn clear_cart(&self, user_id: UserId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM storefront.cart_item WHERE user_id = $1")
            .bind(user_id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
