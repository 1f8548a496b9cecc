//! WebSocket upgrade handler.

use super::session::Session;
use crate::errors::RoomError;
use crate::middleware::extract_bearer_token;
use crate::routes::AppState;

use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::Response,
};
use common::protocol::MAX_EVENT_SIZE_BYTES;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Largest frame the transport accepts. Frames between
/// `MAX_EVENT_SIZE_BYTES` and this limit are answered with an `error`
/// event; larger ones close the connection.
pub const MAX_FRAME_SIZE_BYTES: usize = MAX_EVENT_SIZE_BYTES * 4;

/// Query parameters accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Token for clients that cannot set headers on the upgrade request.
    #[serde(default)]
    pub token: Option<String>,
}

/// Handler for `GET /ws`.
///
/// The token is taken from the `Authorization: Bearer` header, or failing
/// that from the `token` query parameter.
///
/// # Response
///
/// - 101 Switching Protocols: authenticated, session started
/// - 401 Unauthorized: token missing or invalid (no socket is opened)
#[instrument(skip_all, name = "room.gateway.upgrade")]
pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, RoomError> {
    let token = match extract_bearer_token(&headers) {
        Ok(token) => token.to_string(),
        Err(header_error) => query.token.ok_or(header_error)?,
    };

    let identity = state.tokens.verify(&token)?;

    info!(
        target: "room.gateway",
        identity_id = %identity.id,
        "Realtime connection authenticated"
    );

    let registry = state.registry.clone();
    let buffer = state.config.connection_buffer;
    let cancel_token = state.shutdown.child_token();

    Ok(ws
        .max_message_size(MAX_FRAME_SIZE_BYTES)
        .on_upgrade(move |socket| async move {
            Session::new(identity, registry, buffer, cancel_token)
                .run(socket)
                .await;
        }))
}
