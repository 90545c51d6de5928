//! Admin status changes on existing orders.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};

use greenbasket_core::order::{Order, Transition};
use greenbasket_core::types::{OrderId, OrderStatus};

use super::error::OrderError;
use crate::db::{OrderStore, RepositoryError};

/// Drives the order lifecycle.
#[derive(Clone)]
pub struct OrderStatusService {
    orders: Arc<dyn OrderStore>,
}

impl OrderStatusService {
    #[must_use]
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    /// Move order `id` to `to` and persist the result.
    ///
    /// Repeating the current status returns the order untouched.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown order, `InvalidInput` for a transition the
    /// lifecycle does not allow or when another update changed the status
    /// after it was read.
    #[instrument(skip(self), fields(order_id = %id, to = %to))]
    pub async fn update_status(&self, id: OrderId, to: OrderStatus) -> Result<Order, OrderError> {
        let mut order = self
            .orders
            .find_order(id)
            .await?
            .ok_or_else(|| OrderError::NotFound("order".to_string()))?;

        match order.transition(to, Utc::now())? {
            Transition::Unchanged => Ok(order),
            Transition::Changed { from } => {
                self.orders
                    .save_lifecycle(&order, from)
                    .await
                    .map_err(|err| match err {
                        RepositoryError::Conflict(message) => OrderError::InvalidInput(message),
                        other => other.into(),
                    })?;
                info!(from = %from, is_paid = order.is_paid, "Order status changed");
                Ok(order)
            }
        }
    }
}
