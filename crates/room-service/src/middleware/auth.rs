//! Authentication middleware for protected routes.
//!
//! Extracts the Bearer token from the Authorization header, verifies it,
//! and injects the caller's `Identity` into request extensions.

use crate::auth::TokenService;
use crate::errors::RoomError;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::instrument;

/// State for the authentication middleware.
#[derive(Clone)]
pub struct AuthState {
    pub tokens: TokenService,
}

/// Extract the Bearer token from the Authorization header.
///
/// # Errors
///
/// Returns `RoomError::Unauthorized` if the header is missing or not a
/// Bearer credential.
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<&str, RoomError> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            tracing::debug!(target: "room.middleware.auth", "Missing Authorization header");
            RoomError::Unauthorized("Missing Authorization header".to_string())
        })?;

    auth_header.strip_prefix("Bearer ").ok_or_else(|| {
        tracing::debug!(target: "room.middleware.auth", "Invalid Authorization header format");
        RoomError::Unauthorized("Invalid Authorization header format".to_string())
    })
}

/// Authentication middleware for user tokens.
///
/// # Response
///
/// - Returns 401 Unauthorized if the token is missing or invalid
/// - Continues to the next handler with the `Identity` in extensions otherwise
#[instrument(skip_all, name = "room.middleware.auth")]
pub async fn require_auth(
    State(state): State<Arc<AuthState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, RoomError> {
    let token = extract_bearer_token(req.headers())?;
    let identity = state.tokens.verify(token)?;

    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
