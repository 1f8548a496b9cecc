//! Room service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl, and to a
//! short client message for realtime `error` events. Messages returned to
//! clients are generic for internal failures; the actual error is logged
//! server-side.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Room service error type.
///
/// Maps to HTTP status codes:
/// - Unauthorized: 401 Unauthorized
/// - NotFound: 404 Not Found
/// - Conflict: 409 Conflict
/// - BadRequest, Signaling: 400 Bad Request
/// - Connectivity: 503 Service Unavailable
/// - Crypto, Internal: 500 Internal Server Error
#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A realtime event could not be parsed or acted on.
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// A connection or the registry went away mid-operation.
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            RoomError::Unauthorized(_) => 401,
            RoomError::NotFound(_) => 404,
            RoomError::Conflict(_) => 409,
            RoomError::BadRequest(_) | RoomError::Signaling(_) => 400,
            RoomError::Connectivity(_) => 503,
            RoomError::Crypto(_) | RoomError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for the error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            RoomError::Unauthorized(_) => "UNAUTHORIZED",
            RoomError::NotFound(_) => "NOT_FOUND",
            RoomError::Conflict(_) => "CONFLICT",
            RoomError::BadRequest(_) => "BAD_REQUEST",
            RoomError::Signaling(_) => "SIGNALING_ERROR",
            RoomError::Connectivity(_) => "SERVICE_UNAVAILABLE",
            RoomError::Crypto(_) | RoomError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients.
    ///
    /// Internal details (crypto, channel failures) are replaced with a
    /// generic message.
    pub fn client_message(&self) -> String {
        match self {
            RoomError::Unauthorized(reason)
            | RoomError::NotFound(reason)
            | RoomError::Conflict(reason)
            | RoomError::BadRequest(reason)
            | RoomError::Signaling(reason) => reason.clone(),
            RoomError::Connectivity(_) => "Service temporarily unavailable".to_string(),
            RoomError::Crypto(_) | RoomError::Internal(_) => {
                "An internal error occurred".to_string()
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for RoomError {
    fn into_response(self) -> Response {
        match &self {
            RoomError::Crypto(err) => {
                tracing::error!(target: "room.crypto", error = %err, "Cryptographic operation failed");
            }
            RoomError::Internal(err) => {
                tracing::error!(target: "room.internal", error = %err, "Internal error");
            }
            RoomError::Connectivity(reason) => {
                tracing::warn!(target: "room.availability", reason = %reason, "Service unavailable");
            }
            _ => {}
        }

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message: self.client_message(),
            },
        };

        let mut response = (status, Json(error_response)).into_response();

        // Add WWW-Authenticate header for 401 responses
        if status == StatusCode::UNAUTHORIZED {
            if let Ok(header_value) = "Bearer realm=\"huddle\", error=\"invalid_token\"".parse() {
                response
                    .headers_mut()
                    .insert("WWW-Authenticate", header_value);
            }
        }

        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    async fn read_body_json(body: Body) -> serde_json::Value {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_display_not_found() {
        let error = RoomError::NotFound("Room not found".to_string());
        assert_eq!(format!("{}", error), "Not found: Room not found");
    }

    #[test]
    fn test_display_signaling() {
        let error = RoomError::Signaling("Malformed event".to_string());
        assert_eq!(format!("{}", error), "Signaling error: Malformed event");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(RoomError::Unauthorized("x".to_string()).status_code(), 401);
        assert_eq!(RoomError::NotFound("x".to_string()).status_code(), 404);
        assert_eq!(RoomError::Conflict("x".to_string()).status_code(), 409);
        assert_eq!(RoomError::BadRequest("x".to_string()).status_code(), 400);
        assert_eq!(RoomError::Signaling("x".to_string()).status_code(), 400);
        assert_eq!(RoomError::Connectivity("x".to_string()).status_code(), 503);
        assert_eq!(RoomError::Crypto("x".to_string()).status_code(), 500);
        assert_eq!(RoomError::Internal("x".to_string()).status_code(), 500);
    }

    #[test]
    fn test_client_message_hides_internal_details() {
        let error = RoomError::Internal("channel send failed: closed".to_string());
        assert_eq!(error.client_message(), "An internal error occurred");

        let error = RoomError::Crypto("bcrypt: invalid cost".to_string());
        assert_eq!(error.client_message(), "An internal error occurred");

        let error = RoomError::NotFound("Room not found".to_string());
        assert_eq!(error.client_message(), "Room not found");
    }

    #[tokio::test]
    async fn test_into_response_not_found() {
        let response = RoomError::NotFound("Room not found".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert_eq!(body["error"]["message"], "Room not found");
    }

    #[tokio::test]
    async fn test_into_response_conflict() {
        let response = RoomError::Conflict("Username already taken".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_into_response_unauthorized_has_www_authenticate() {
        let response = RoomError::Unauthorized("Invalid credentials".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let header = response
            .headers()
            .get("WWW-Authenticate")
            .expect("401 must carry WWW-Authenticate");
        assert!(header.to_str().unwrap().starts_with("Bearer"));
    }

    #[tokio::test]
    async fn test_into_response_internal_is_generic() {
        let response = RoomError::Internal("registry actor gone".to_string()).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().get("WWW-Authenticate").is_none());
        let body = read_body_json(response.into_body()).await;
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }
}
