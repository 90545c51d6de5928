//! Wallet and loyalty ledger repository.
//!
//! The balance row is locked, the entry is checked against it, and the new
//! balance plus the history row are written in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use greenbasket_core::ledger::{EntryRequest, LedgerEntry, LedgerError, LedgerKind};
use greenbasket_core::types::UserId;

use super::RepositoryError;

/// Why a ledger write did not happen.
#[derive(Debug, Error)]
pub enum LedgerWriteError {
    /// The entry breaks a ledger rule (e.g. overdraft).
    #[error(transparent)]
    Rejected(#[from] LedgerError),

    /// No such user.
    #[error("user not found")]
    UserNotFound,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Balance changes for wallet and loyalty points.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Apply a validated entry to the user's `kind` balance and record it.
    async fn apply_entry(
        &self,
        user_id: UserId,
        kind: LedgerKind,
        entry: &EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError>;
}

struct LedgerSql {
    lock_balance: &'static str,
    update_balance: &'static str,
    insert_entry: &'static str,
}

const WALLET_SQL: LedgerSql = LedgerSql {
    lock_balance: "SELECT wallet_balance FROM storefront.user WHERE id = $1 FOR UPDATE",
    update_balance: "UPDATE storefront.user SET wallet_balance = $2, updated_at = NOW() WHERE id = $1",
    insert_entry: r"
        INSERT INTO storefront.wallet_transaction (user_id, direction, amount, reason, balance_after)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING created_at
    ",
};

const LOYALTY_SQL: LedgerSql = LedgerSql {
    lock_balance: "SELECT loyalty_points FROM storefront.user WHERE id = $1 FOR UPDATE",
    update_balance: "UPDATE storefront.user SET loyalty_points = $2, updated_at = NOW() WHERE id = $1",
    insert_entry: r"
        INSERT INTO storefront.loyalty_transaction (user_id, direction, amount, reason, balance_after)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING created_at
    ",
};

const fn sql_for(kind: LedgerKind) -> &'static LedgerSql {
    match kind {
        LedgerKind::Wallet => &WALLET_SQL,
        LedgerKind::Loyalty => &LOYALTY_SQL,
    }
}

/// `PostgreSQL` ledger repository.
#[derive(Debug, Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    /// Create a new ledger repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerRepository {
    async fn apply_entry(
        &self,
        user_id: UserId,
        kind: LedgerKind,
        entry: &EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError> {
        let sql = sql_for(kind);
        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;

        let balance: Option<Decimal> = sqlx::query_scalar(sql.lock_balance)
            .bind(user_id.as_i32())
            .fetch_optional(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;
        let balance = balance.ok_or(LedgerWriteError::UserNotFound)?;

        // Dropping `tx` on the error path rolls back and releases the lock.
        let balance_after = entry.apply_to(balance)?;

        sqlx::query(sql.update_balance)
            .bind(user_id.as_i32())
            .bind(balance_after)
            .execute(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        let created_at: DateTime<Utc> = sqlx::query_scalar(sql.insert_entry)
            .bind(user_id.as_i32())
            .bind(entry.direction)
            .bind(entry.amount)
            .bind(&entry.reason)
            .bind(balance_after)
            .fetch_one(&mut *tx)
            .await
            .map_err(RepositoryError::from)?;

        tx.commit().await.map_err(RepositoryError::from)?;

        Ok(LedgerEntry {
            user_id,
            kind,
            direction: entry.direction,
            amount: entry.amount,
            reason: entry.reason.clone(),
            balance_after,
            created_at,
        })
    }
}
