//! Wallet and loyalty ledgers.
//!
//! Balances never change by direct assignment. Every change is an entry
//! (credit or debit, positive amount, reason) applied to the current
//! balance; a debit that would go negative is refused.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{UserId, round_money};

/// Which balance an entry moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Store credit, in currency.
    Wallet,
    /// Loyalty points, whole numbers only.
    Loyalty,
}

impl LedgerKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Wallet => "wallet",
            Self::Loyalty => "loyalty",
        }
    }
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "storefront.ledger_direction", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Credit,
    Debit,
}

/// A requested balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRequest {
    pub direction: Direction,
    pub amount: Decimal,
    pub reason: String,
}

/// A recorded balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub user_id: UserId,
    pub kind: LedgerKind,
    pub direction: Direction,
    pub amount: Decimal,
    pub reason: String,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("loyalty points must be whole numbers")]
    FractionalPoints,
    #[error("a reason is required")]
    MissingReason,
    #[error("insufficient balance: {balance} available, {requested} requested")]
    InsufficientBalance { balance: Decimal, requested: Decimal },
}

impl EntryRequest {
    /// Normalize the request for `kind`: trims the reason and rounds wallet
    /// amounts to 2 decimal places.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` for a non-positive amount, fractional loyalty
    /// points, or a blank reason.
    pub fn validate(self, kind: LedgerKind) -> Result<Self, LedgerError> {
        let amount = match kind {
            LedgerKind::Wallet => round_money(self.amount),
            LedgerKind::Loyalty => {
                if !self.amount.fract().is_zero() {
                    return Err(LedgerError::FractionalPoints);
                }
                self.amount
            }
        };
        if amount <= Decimal::ZERO {
            return Err(LedgerError::NonPositiveAmount);
        }

        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            return Err(LedgerError::MissingReason);
        }

        Ok(Self {
            direction: self.direction,
            amount,
            reason,
        })
    }

    /// The balance after applying this entry to `balance`.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::InsufficientBalance` when a debit exceeds the
    /// balance.
    pub fn apply_to(&self, balance: Decimal) -> Result<Decimal, LedgerError> {
        match self.direction {
            Direction::Credit => Ok(balance + self.amount),
            Direction::Debit if self.amount > balance => Err(LedgerError::InsufficientBalance {
                balance,
                requested: self.amount,
            }),
            Direction::Debit => Ok(balance - self.amount),
        }
    }
}
