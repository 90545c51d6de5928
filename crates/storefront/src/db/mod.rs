//! Database operations for storefront `PostgreSQL`.
//!
//! # Schema: `storefront`
//!
//! ## Tables
//!
//! - `user` - Shoppers with wallet and loyalty balances
//! - `admin_user` - Back-office staff
//! - `category`, `item` - Catalog
//! - `address` - Address book (one default per user)
//! - `coupon` - Discount codes and usage counters
//! - `cart_item` - Current cart lines
//! - `order` - Orders with JSONB snapshots
//! - `wallet_transaction`, `loyalty_transaction` - Ledger history
//! - `sessions` - Tower-sessions storage
//!
//! # Collaborators
//!
//! Services never see `PgPool` directly. Each table group is reached through
//! an `async_trait` store trait defined next to its `Pg*Repository`
//! implementation, so the order flow can be driven by in-memory stores in
//! tests.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p greenbasket-cli -- migrate
//! ```

pub mod addresses;
pub mod carts;
pub mod catalog;
pub mod coupons;
pub mod ledger;
pub mod orders;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use addresses::{AddressStore, PgAddressRepository};
pub use carts::{CartStore, PgCartRepository};
pub use catalog::{CatalogStore, PgCatalogRepository};
pub use coupons::{CouponStore, PgCouponRepository};
pub use ledger::{LedgerStore, LedgerWriteError, PgLedgerRepository};
pub use orders::{OrderStore, PgOrderRepository};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate coupon code).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

impl RepositoryError {
    /// Map a unique-constraint violation to `Conflict`, anything else to `Database`.
    pub(crate) fn from_unique(err: sqlx::Error, what: &str) -> Self {
        if matches!(&err, sqlx::Error::Database(db) if db.is_unique_violation()) {
            return Self::Conflict(format!("{what} already exists"));
        }
        Self::Database(err)
    }
}

/// Decode a JSONB snapshot column.
pub(crate) fn from_json<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
    column: &str,
) -> Result<T, RepositoryError> {
    serde_json::from_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("invalid {column} snapshot: {e}")))
}

/// Encode a value for a JSONB snapshot column.
pub(crate) fn to_json<T: serde::Serialize>(
    value: &T,
    column: &str,
) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("cannot encode {column}: {e}")))
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
