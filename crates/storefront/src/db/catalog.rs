//! Catalog repository: item lookup, stock bookkeeping, deletions.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;

use greenbasket_core::catalog::{Item, StockDecrement};
use greenbasket_core::types::{CategoryId, ItemId};

use super::RepositoryError;

/// Catalog operations used by pricing, finalization and category admin.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Load items by id, active or not. Unknown ids are simply absent.
    async fn find_items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, RepositoryError>;

    /// Atomically take `quantity` off a managed item's stock, never going
    /// below zero.
    async fn decrement_stock(
        &self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError>;

    /// Whether the category exists.
    async fn category_exists(&self, id: CategoryId) -> Result<bool, RepositoryError>;

    /// All items filed under a category.
    async fn items_in_category(&self, id: CategoryId) -> Result<Vec<Item>, RepositoryError>;

    /// Delete an item row, returning it if it existed.
    async fn delete_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError>;

    /// Delete a category row. Returns false if it did not exist.
    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError>;
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    id: i32,
    category_id: Option<i32>,
    name: String,
    price: Decimal,
    unit: Option<String>,
    stock: i32,
    manage_stock: bool,
    is_active: bool,
    taxable: bool,
    cgst_rate: Decimal,
    sgst_rate: Decimal,
    image: Option<String>,
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Self {
            id: ItemId::new(row.id),
            category_id: row.category_id.map(CategoryId::new),
            name: row.name,
            price: row.price,
            unit: row.unit,
            stock: row.stock,
            manage_stock: row.manage_stock,
            is_active: row.is_active,
            taxable: row.taxable,
            cgst_rate: row.cgst_rate,
            sgst_rate: row.sgst_rate,
            image: row.image,
        }
    }
}

const ITEM_COLUMNS: &str = "id, category_id, name, price, unit, stock, manage_stock, \
                            is_active, taxable, cgst_rate, sgst_rate, image";

/// `PostgreSQL` catalog repository.
#[derive(Debug, Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    /// Create a new catalog repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogRepository {
    async fn find_items_by_ids(&self, ids: &[ItemId]) -> Result<Vec<Item>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ItemId::as_i32).collect();

        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.item WHERE id = ANY($1)"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn decrement_stock(
        &self,
        id: ItemId,
        quantity: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        let quantity_i32 = i32::try_from(quantity).unwrap_or(i32::MAX);

        // Single conditional statement: concurrent orders cannot both pass
        // the `stock >= $2` guard for the same units.
        let remaining: Option<i32> = sqlx::query_scalar(
            r"
            UPDATE storefront.item
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND manage_stock AND stock >= $2
            RETURNING stock
            ",
        )
        .bind(id.as_i32())
        .bind(quantity_i32)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(remaining) = remaining {
            return Ok(StockDecrement::Applied { remaining });
        }

        let managed: Option<bool> =
            sqlx::query_scalar("SELECT manage_stock FROM storefront.item WHERE id = $1")
                .bind(id.as_i32())
                .fetch_optional(&self.pool)
                .await?;

        match managed {
            None => Ok(StockDecrement::Missing),
            Some(false) => Ok(StockDecrement::Unmanaged),
            Some(true) => {
                sqlx::query(
                    "UPDATE storefront.item SET stock = 0, updated_at = NOW() WHERE id = $1",
                )
                .bind(id.as_i32())
                .execute(&self.pool)
                .await?;
                Ok(StockDecrement::Clamped {
                    requested: quantity,
                })
            }
        }
    }

    async fn category_exists(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM storefront.category WHERE id = $1)",
        )
        .bind(id.as_i32())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn items_in_category(&self, id: CategoryId) -> Result<Vec<Item>, RepositoryError> {
        let rows = sqlx::query_as::<_, ItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM storefront.item WHERE category_id = $1 ORDER BY id"
        ))
        .bind(id.as_i32())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Item::from).collect())
    }

    async fn delete_item(&self, id: ItemId) -> Result<Option<Item>, RepositoryError> {
        let row = sqlx::query_as::<_, ItemRow>(&format!(
            "DELETE FROM storefront.item WHERE id = $1 RETURNING {ITEM_COLUMNS}"
        ))
        .bind(id.as_i32())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Item::from))
    }

    async fn delete_category(&self, id: CategoryId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM storefront.category WHERE id = $1")
            .bind(id.as_i32())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
