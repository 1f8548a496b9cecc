//! Room handlers.
//!
//! Rooms are created over HTTP and joined over the realtime channel.

use crate::errors::RoomError;
use crate::models::CreateRoomResponse;
use crate::routes::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use common::protocol::RoomSnapshot;
use common::types::{Identity, RoomId};
use std::sync::Arc;
use tracing::instrument;

/// Handler for `POST /api/rooms`.
///
/// Creates an empty room owned by the caller. The caller still has to
/// `join-room` over the realtime channel to become a participant.
///
/// # Response
///
/// - 201 Created: `{roomId}`
/// - 401 Unauthorized: missing or invalid token
#[instrument(skip_all, name = "room.handlers.create_room")]
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<(StatusCode, Json<CreateRoomResponse>), RoomError> {
    let room_id = state.registry.create_room(identity).await?;
    Ok((StatusCode::CREATED, Json(CreateRoomResponse { room_id })))
}

/// Handler for `GET /api/rooms/:room_id`.
///
/// # Response
///
/// - 200 OK: room snapshot
/// - 401 Unauthorized: missing or invalid token
/// - 404 Not Found: no such room
#[instrument(skip_all, name = "room.handlers.get_room")]
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomSnapshot>, RoomError> {
    let snapshot = state.registry.get_room(RoomId(room_id)).await?;
    Ok(Json(snapshot))
}
