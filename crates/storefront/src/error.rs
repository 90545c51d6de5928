//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//! Bodies are JSON: `{"error": <kind>, "message": <text>}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use greenbasket_core::ledger::LedgerError;
use greenbasket_core::types::ItemId;

use crate::db::{LedgerWriteError, RepositoryError};
use crate::services::{CatalogAdminError, CouponAdminError, OrderError};

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// Order placement or lifecycle failure.
    #[error(transparent)]
    Order(#[from] OrderError),

    /// Coupon definition failure.
    #[error(transparent)]
    Coupon(#[from] CouponAdminError),

    /// Catalog delete failure.
    #[error(transparent)]
    Catalog(#[from] CatalogAdminError),

    /// Wallet or loyalty write failure.
    #[error(transparent)]
    Ledger(#[from] LedgerWriteError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller is not signed in with the required identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_payment_id: Option<String>,
    /// Items that can no longer be ordered.
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Vec<ItemId>>,
}

impl AppError {
    /// Whether the error is our fault and must be reported.
    fn is_server_error(&self) -> bool {
        match self {
            Self::Order(err) => err.is_server_side(),
            Self::Coupon(CouponAdminError::Repository(err)) | Self::Database(err) => {
                !matches!(err, RepositoryError::NotFound | RepositoryError::Conflict(_))
            }
            Self::Catalog(err) => !matches!(err, CatalogAdminError::NotFound(_)),
            Self::Ledger(err) => matches!(err, LedgerWriteError::Repository(_)),
            Self::Internal(_) => true,
            Self::Coupon(_) | Self::NotFound(_) | Self::Unauthorized(_) | Self::BadRequest(_) => {
                false
            }
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Order(err) => order_status(err),
            Self::Coupon(CouponAdminError::Definition(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Coupon(CouponAdminError::Repository(err)) | Self::Database(err) => {
                repository_status(err)
            }
            Self::Catalog(CatalogAdminError::NotFound(_)) | Self::NotFound(_) => {
                StatusCode::NOT_FOUND
            }
            Self::Catalog(CatalogAdminError::Repository(err)) => repository_status(err),
            Self::Catalog(CatalogAdminError::Partial { .. }) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Ledger(LedgerWriteError::Rejected(LedgerError::InsufficientBalance { .. })) => {
                StatusCode::CONFLICT
            }
            Self::Ledger(LedgerWriteError::Rejected(_)) => StatusCode::BAD_REQUEST,
            Self::Ledger(LedgerWriteError::UserNotFound) => StatusCode::NOT_FOUND,
            Self::Ledger(LedgerWriteError::Repository(err)) => repository_status(err),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Order(err) => err.kind(),
            Self::Coupon(CouponAdminError::Definition(_)) => "invalid_coupon_definition",
            Self::Ledger(LedgerWriteError::Rejected(LedgerError::InsufficientBalance { .. })) => {
                "insufficient_balance"
            }
            Self::Ledger(LedgerWriteError::Rejected(_)) | Self::BadRequest(_) => "invalid_input",
            Self::Catalog(CatalogAdminError::Partial { .. }) => "partial_delete",
            Self::Catalog(CatalogAdminError::NotFound(_))
            | Self::Ledger(LedgerWriteError::UserNotFound)
            | Self::NotFound(_) => "not_found",
            Self::Unauthorized(_) => "unauthorized",
            Self::Coupon(CouponAdminError::Repository(err))
            | Self::Catalog(CatalogAdminError::Repository(err))
            | Self::Ledger(LedgerWriteError::Repository(err))
            | Self::Database(err) => match err {
                RepositoryError::NotFound => "not_found",
                RepositoryError::Conflict(_) => "conflict",
                _ => "internal",
            },
            Self::Internal(_) => "internal",
        }
    }

    fn body(&self, reference: Option<String>) -> ErrorBody {
        let mut body = ErrorBody {
            error: self.kind(),
            message: String::new(),
            reference: None,
            provider_order_id: None,
            provider_payment_id: None,
            items: None,
        };

        body.message = match self {
            Self::Order(err @ OrderError::Critical(failure)) => {
                body.provider_order_id = Some(failure.provider_order_id.clone());
                body.provider_payment_id = Some(failure.provider_payment_id.clone());
                body.reference = reference;
                err.to_string()
            }
            Self::Order(err @ OrderError::ProviderUnreachable(_)) => {
                body.reference = reference;
                err.to_string()
            }
            Self::Order(OrderError::Internal(_) | OrderError::ServerMisconfigured(_))
            | Self::Internal(_) => "Internal server error".to_string(),
            Self::Order(err @ OrderError::ItemsUnavailable(ids)) => {
                body.items = Some(ids.clone());
                err.to_string()
            }
            Self::Order(err) => err.to_string(),
            Self::Catalog(CatalogAdminError::Partial { deleted, .. }) => {
                format!("category not deleted; {deleted} item(s) were removed before a failure")
            }
            Self::Database(err)
            | Self::Coupon(CouponAdminError::Repository(err))
            | Self::Catalog(CatalogAdminError::Repository(err))
            | Self::Ledger(LedgerWriteError::Repository(err)) => match err {
                RepositoryError::NotFound => "Not found".to_string(),
                RepositoryError::Conflict(what) => what.clone(),
                _ => "Internal server error".to_string(),
            },
            Self::NotFound(what) => format!("{what} not found"),
            Self::Unauthorized(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Coupon(err) => err.to_string(),
            Self::Catalog(err) => err.to_string(),
            Self::Ledger(err) => err.to_string(),
        };
        body
    }
}

const fn order_status(err: &OrderError) -> StatusCode {
    match err {
        OrderError::InvalidInput(_)
        | OrderError::InvalidCoupon
        | OrderError::CouponExhausted
        | OrderError::CouponUserLimitReached { .. }
        | OrderError::MinPurchaseNotMet { .. }
        | OrderError::MissingCoordinates
        | OrderError::SignatureInvalid => StatusCode::BAD_REQUEST,
        OrderError::NotFound(_) => StatusCode::NOT_FOUND,
        OrderError::ItemsUnavailable(_)
        | OrderError::InsufficientStock { .. }
        | OrderError::Critical(_) => StatusCode::CONFLICT,
        OrderError::OutOfZone => StatusCode::UNPROCESSABLE_ENTITY,
        OrderError::PaymentNotCaptured { .. } => StatusCode::PAYMENT_REQUIRED,
        OrderError::ProviderUnreachable(_) => StatusCode::GATEWAY_TIMEOUT,
        OrderError::ServerMisconfigured(_) | OrderError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

const fn repository_status(err: &RepositoryError) -> StatusCode {
    match err {
        RepositoryError::NotFound => StatusCode::NOT_FOUND,
        RepositoryError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        let reference = if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
            Some(event_id.to_string())
        } else {
            None
        };

        let status = self.status();
        let body = self.body(reference);
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from a session identity.
pub fn set_sentry_user(id: &impl ToString, kind: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(id.to_string()),
            ..Default::default()
        }));
        scope.set_tag("identity.kind", kind);
    });
}

/// Add a breadcrumb for user actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}
