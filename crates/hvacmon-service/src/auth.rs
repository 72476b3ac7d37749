//! Session authentication middleware and role checks.
//!
//! Every endpoint except `/api/health` and `/api/auth/login` requires a
//! bearer token issued by the login endpoint. The middleware resolves
//! the token to an [`AuthUser`] and attaches it to the request; handlers
//! then gate mutations on the caller's role.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use hvacmon_types::Role;

use crate::api::AppError;
use crate::state::{AppState, AuthUser};

/// Session token middleware.
///
/// Expects `Authorization: Bearer <token>`. Returns 401 for a missing,
/// unknown or expired token.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return AppError::Unauthorized("Missing bearer token".to_string()).into_response();
    };

    match state.session_user(token).await {
        Some(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        None => {
            warn!("Rejected request with invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".to_string()).into_response()
        }
    }
}

/// Check that the caller holds at least `min` role.
pub fn require_role(user: &AuthUser, min: Role) -> Result<(), AppError> {
    if user.role >= min {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "Requires {} role or higher",
            min
        )))
    }
}

/// Extract the token from an `Authorization: Bearer` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}
