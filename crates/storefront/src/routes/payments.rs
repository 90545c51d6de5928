//! Online payment checkout.
//!
//! The browser first asks for a provider order (`/order`), pays through
//! the provider widget, then posts the proof with the same order payload
//! (`/verify`). Nothing is stored until `/verify` succeeds.

use axum::{Json, extract::State, http::StatusCode};

use greenbasket_core::order::Order;

use crate::error::{Result, add_breadcrumb};
use crate::middleware::RequireUser;
use crate::services::{CheckoutIntent, OnlineOrderRequest, OrderRequest};
use crate::state::AppState;

/// Price the order and open a provider order for the total.
///
/// POST /api/payments/order
///
/// # Errors
///
/// Validation, eligibility and pricing failures, or 504 when the provider
/// cannot be reached.
pub async fn create_order(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<OrderRequest>,
) -> Result<Json<CheckoutIntent>> {
    add_breadcrumb("payment", "Opening provider order", None);
    let intent = state
        .services()
        .finalizer
        .begin_online_checkout(user_id, &request)
        .await?;
    Ok(Json(intent))
}

/// Verify the payment and create the order.
///
/// POST /api/payments/verify
///
/// # Errors
///
/// Reconciliation failures; post-capture failures answer 409 with the
/// provider ids for manual review.
pub async fn verify(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Json(request): Json<OnlineOrderRequest>,
) -> Result<(StatusCode, Json<Order>)> {
    add_breadcrumb(
        "payment",
        "Verifying payment",
        Some(&[("provider_order_id", request.payment.provider_order_id.as_str())]),
    );
    let order = state
        .services()
        .finalizer
        .place_online_order(user_id, &request)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}
