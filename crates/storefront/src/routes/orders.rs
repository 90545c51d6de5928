//! Cash-on-delivery order placement.

use axum::{Json, extract::State, http::StatusCode};

use greenbasket_core::order::Order;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::services::OrderRequest;
use crate::state::AppState;

/// Place a cash-on-delivery order.
///
/// POST /api/orders
///
/// # Errors
///
/// Any order placement failure, mapped by `AppError`.
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<OrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    add_breadcrumb("order", "Placing cash order", None);
    let order = state
        .services()
        .finalizer
        .place_cod_order(user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
