//! Account registration and login handlers.

use crate::errors::RoomError;
use crate::models::{AuthResponse, CredentialsRequest};
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use common::secret::SecretString;
use common::types::Identity;
use std::sync::Arc;
use tracing::instrument;

/// Handler for `POST /api/register`.
///
/// # Response
///
/// - 201 Created: `{token, userId, username}`
/// - 400 Bad Request: body missing, unparseable, or a field missing/empty
/// - 409 Conflict: username taken
#[instrument(skip_all, name = "room.handlers.register")]
pub async fn register(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<(StatusCode, Json<AuthResponse>), RoomError> {
    let (username, password) = parse_credentials(&body)?;

    let identity = state.accounts.register(&username, &password).await?;
    let response = auth_response(&state, identity)?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// Handler for `POST /api/login`.
///
/// # Response
///
/// - 200 OK: `{token, userId, username}`
/// - 400 Bad Request: body missing, unparseable, or a field missing/empty
/// - 401 Unauthorized: unknown username or wrong password
#[instrument(skip_all, name = "room.handlers.login")]
pub async fn login(
    State(state): State<Arc<AppState>>,
    body: axum::body::Bytes,
) -> Result<Json<AuthResponse>, RoomError> {
    let (username, password) = parse_credentials(&body)?;

    let identity = state.accounts.login(&username, &password).await?;

    Ok(Json(auth_response(&state, identity)?))
}

fn parse_credentials(body: &[u8]) -> Result<(String, SecretString), RoomError> {
    // Deserialize manually to return 400 (not Axum's default 422)
    let request: CredentialsRequest = serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(target: "room.handlers.auth", error = %e, "Invalid request body");
        RoomError::BadRequest("Invalid request body".to_string())
    })?;

    match (request.username, request.password) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => Err(RoomError::BadRequest(
            "Username and password are required".to_string(),
        )),
    }
}

fn auth_response(state: &AppState, identity: Identity) -> Result<AuthResponse, RoomError> {
    let token = state.tokens.issue(&identity)?;
    Ok(AuthResponse {
        token,
        user_id: identity.id,
        username: identity.display_name,
    })
}
