//! Authentication extractors.
//!
//! `RequireUser` and `RequireAdmin` read the [`SessionIdentity`] from the
//! session and reject with 401 when it is absent or of the other kind.

use axum::{
    Json,
    extract::FromRequestParts,
    http::{StatusCode, request::Parts},
    response::{IntoResponse, Response},
};
use tower_sessions::Session;

use greenbasket_core::types::{AdminUserId, UserId};

use crate::error::set_sentry_user;
use crate::models::{SessionIdentity, session_keys};

/// Extractor that requires a signed-in shopper.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user_id): RequireUser) -> impl IntoResponse {
///     format!("Hello, user {user_id}!")
/// }
/// ```
pub struct RequireUser(pub UserId);

/// Extractor that requires a signed-in admin.
pub struct RequireAdmin(pub AdminUserId);

/// Returned when the session does not carry the required identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthRejection;

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({
                "error": "unauthorized",
                "message": "please sign in to continue",
            })),
        )
            .into_response()
    }
}

async fn session_identity(parts: &Parts) -> Option<SessionIdentity> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<SessionIdentity>(session_keys::IDENTITY)
        .await
        .ok()
        .flatten()
}

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = session_identity(parts).await.ok_or(AuthRejection)?;
        let user_id = identity.as_user().ok_or(AuthRejection)?;
        set_sentry_user(&user_id, identity.kind.as_str());
        Ok(Self(user_id))
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let identity = session_identity(parts).await.ok_or(AuthRejection)?;
        let admin_id = identity.as_admin().ok_or(AuthRejection)?;
        set_sentry_user(&admin_id, identity.kind.as_str());
        Ok(Self(admin_id))
    }
}

/// Store `identity` in the session, replacing any previous one.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_identity(
    session: &Session,
    identity: SessionIdentity,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(session_keys::IDENTITY, identity).await
}

/// Remove the identity from the session (sign out).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_identity(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<SessionIdentity>(session_keys::IDENTITY)
        .await?;
    Ok(())
}
