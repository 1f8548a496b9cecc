//! Request and response bodies for the HTTP API.

use common::secret::SecretString;
use common::types::{RoomId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of `POST /api/register` and `POST /api/login`.
///
/// Fields are optional so that a missing field is reported as 400 by the
/// handler rather than rejected by the extractor.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<SecretString>,
}

impl fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Successful register/login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub user_id: UserId,
    pub username: String,
}

/// Response of `POST /api/rooms`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoomResponse {
    pub room_id: RoomId,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" while the registry answers, "unhealthy" otherwise.
    pub status: String,
    pub rooms: usize,
    pub participants: usize,
}
