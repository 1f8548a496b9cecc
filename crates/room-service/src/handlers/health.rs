//! Health check handler.

use crate::models::HealthResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::instrument;

/// Health check handler.
///
/// Asks the registry for its counts. A registry that does not answer is
/// reported as unhealthy rather than as an error.
///
/// ## Example Response
///
/// ```json
/// { "status": "healthy", "rooms": 3, "participants": 7 }
/// ```
#[instrument(skip_all, name = "room.health.check")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let response = match state.registry.stats().await {
        Ok(stats) => HealthResponse {
            status: "healthy".to_string(),
            rooms: stats.rooms,
            participants: stats.participants,
        },
        Err(e) => {
            tracing::warn!(target: "room.health", error = %e, "Registry unavailable");
            HealthResponse {
                status: "unhealthy".to_string(),
                rooms: 0,
                participants: 0,
            }
        }
    };

    Json(response)
}
