//! Green Basket storefront library.
//!
//! Order finalization for the Green Basket grocery store: delivery
//! eligibility, pricing, coupons, payment reconciliation and the order
//! lifecycle, served over a JSON API. Exposed as a library so the services
//! can be exercised with in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

use axum::{Router, middleware as axum_middleware};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the application router with its per-request layers.
///
/// The session layer is added by the caller so tests can supply their own.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
