//! Admin API: order lifecycle, coupons, catalog deletes, ledger.

use std::str::FromStr;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use greenbasket_core::coupon::{Coupon, NewCoupon};
use greenbasket_core::ledger::{EntryRequest, LedgerEntry};
use greenbasket_core::order::Order;
use greenbasket_core::types::{CategoryId, OrderId, OrderStatus, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::CategoryDeletion;
use crate::state::AppState;

/// Body of a status change.
#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

fn parse_id<T>(raw: &str, what: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| AppError::BadRequest(format!("invalid {what} id: {e}")))
}

/// Move an order along its lifecycle.
///
/// PATCH /api/admin/orders/{id}/status
///
/// # Errors
///
/// 400 for a malformed id or a disallowed transition, 404 for an unknown order.
pub async fn update_order_status(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<String>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<Order>> {
    let id: OrderId = parse_id(&id, "order")?;
    let order = state
        .services()
        .order_status
        .update_status(id, update.status)
        .await?;
    Ok(Json(order))
}

/// Define a coupon.
///
/// POST /api/admin/coupons
///
/// # Errors
///
/// 400 for an invalid definition, 409 for a duplicate code.
pub async fn create_coupon(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Json(coupon): Json<NewCoupon>,
) -> Result<(StatusCode, Json<Coupon>)> {
    let coupon = state.services().coupons.create(coupon).await?;
    Ok((StatusCode::CREATED, Json(coupon)))
}

/// Delete a category and all of its items.
///
/// DELETE /api/admin/categories/{id}
///
/// # Errors
///
/// 404 for an unknown category, 500 when an item delete fails partway.
pub async fn delete_category(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<String>,
) -> Result<Json<CategoryDeletion>> {
    let id: CategoryId = parse_id(&id, "category")?;
    let report = state.services().catalog.delete_category(id).await?;
    Ok(Json(report))
}

/// Credit or debit a user's wallet.
///
/// POST /api/admin/users/{id}/wallet
///
/// # Errors
///
/// 400 for an invalid entry, 404 for an unknown user, 409 for an overdraft.
pub async fn wallet_transaction(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<String>,
    Json(entry): Json<EntryRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>)> {
    let user_id: UserId = parse_id(&id, "user")?;
    let recorded = state
        .services()
        .ledger
        .add_wallet_transaction(user_id, entry)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}

/// Credit or debit a user's loyalty points.
///
/// POST /api/admin/users/{id}/loyalty
///
/// # Errors
///
/// Same as [`wallet_transaction`]; points must be whole.
pub async fn loyalty_transaction(
    State(state): State<AppState>,
    RequireAdmin(admin_id): RequireAdmin,
    Path(id): Path<String>,
    Json(entry): Json<EntryRequest>,
) -> Result<(StatusCode, Json<LedgerEntry>)> {
    let user_id: UserId = parse_id(&id, "user")?;
    let recorded = state
        .services()
        .ledger
        .add_loyalty_transaction(user_id, entry)
        .await?;
    Ok((StatusCode::CREATED, Json(recorded)))
}
