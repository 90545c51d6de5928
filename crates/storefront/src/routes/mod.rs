//! HTTP route handlers for storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                              - Liveness
//! GET    /health/ready                        - Readiness (database ping)
//!
//! # Shopper (requires a User session)
//! POST   /api/orders                          - Place a cash-on-delivery order
//! POST   /api/payments/order                  - Open a provider order for the priced total
//! POST   /api/payments/verify                 - Verify payment and place the online order
//!
//! # Admin (requires an Admin session)
//! PATCH  /api/admin/orders/{id}/status        - Order status transition
//! POST   /api/admin/coupons                   - Create a coupon
//! DELETE /api/admin/categories/{id}           - Delete a category and its items
//! POST   /api/admin/users/{id}/wallet         - Wallet credit/debit
//! POST   /api/admin/users/{id}/loyalty        - Loyalty credit/debit
//! ```

pub mod admin;
pub mod health;
pub mod orders;
pub mod payments;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

/// Create the shopper API router.
pub fn shopper_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create))
        .route("/payments/order", post(payments::create_order))
        .route("/payments/verify", post(payments::verify))
}

/// Create the admin API router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/orders/{id}/status", patch(admin::update_order_status))
        .route("/coupons", post(admin::create_coupon))
        .route("/categories/{id}", delete(admin::delete_category))
        .route("/users/{id}/wallet", post(admin::wallet_transaction))
        .route("/users/{id}/loyalty", post(admin::loyalty_transaction))
}

/// Create all routes for the storefront.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", shopper_routes().nest("/admin", admin_routes()))
}
