//! Wallet and loyalty adjustments.
//!
//! These are the only operations that change a user's wallet balance or
//! loyalty points.

use std::sync::Arc;

use tracing::{info, instrument};

use greenbasket_core::ledger::{EntryRequest, LedgerEntry, LedgerKind};
use greenbasket_core::types::UserId;

use crate::db::{LedgerStore, LedgerWriteError};

#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
}

impl LedgerService {
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Credit or debit the user's wallet.
    ///
    /// # Errors
    ///
    /// `Rejected` for an invalid entry or an overdraft, `UserNotFound`, or a
    /// repository failure.
    pub async fn add_wallet_transaction(
        &self,
        user_id: UserId,
        entry: EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError> {
        self.apply(user_id, LedgerKind::Wallet, entry).await
    }

    /// Credit or debit the user's loyalty points.
    ///
    /// # Errors
    ///
    /// Same as [`Self::add_wallet_transaction`]; points must also be whole.
    pub async fn add_loyalty_transaction(
        &self,
        user_id: UserId,
        entry: EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError> {
        self.apply(user_id, LedgerKind::Loyalty, entry).await
    }

    #[instrument(skip(self, entry), fields(user_id = %user_id, kind = kind.as_str()))]
    async fn apply(
        &self,
        user_id: UserId,
        kind: LedgerKind,
        entry: EntryRequest,
    ) -> Result<LedgerEntry, LedgerWriteError> {
        let entry = entry.validate(kind)?;
        let recorded = self.store.apply_entry(user_id, kind, &entry).await?;
        info!(
            direction = ?recorded.direction,
            amount = %recorded.amount,
            balance_after = %recorded.balance_after,
            "Ledger entry recorded"
        );
        Ok(recorded)
    }
}
