//! Call negotiation coordinator.
//!
//! Forwards call requests, call responses and opaque WebRTC signaling
//! payloads to the target identity's connection. The coordinator keeps no
//! call state. An event whose target is not connected to any room is
//! dropped: the sender never receives an error for it.

use super::arena::RoomArena;
use crate::observability::metrics;

use common::protocol::{CallType, ServerEvent, SignalPayload};
use common::types::{Identity, RoomId, UserId};
use tracing::debug;

/// Forward a `call-request` from `caller` to `target`.
///
/// `room_id` is informational; resolution is across all rooms.
pub fn request_call(
    arena: &RoomArena,
    caller: Identity,
    room_id: &RoomId,
    target: UserId,
    call_type: CallType,
) {
    debug!(
        target: "room.signaling",
        caller_id = %caller.id,
        target_id = %target,
        room_id = %room_id,
        call_type = ?call_type,
        "Call requested"
    );
    forward(
        arena,
        target,
        "call-request",
        ServerEvent::CallRequest {
            caller_identity: caller,
            call_type,
        },
    );
}

/// Forward a `call-response` from `responder` to `target`.
pub fn respond_call(arena: &RoomArena, responder: &Identity, target: UserId, accepted: bool) {
    forward(
        arena,
        target,
        "call-response",
        ServerEvent::CallResponse {
            identity_id: responder.id,
            accepted,
        },
    );
}

/// Forward an opaque signaling payload from `sender` to `target`.
pub fn relay_signal(arena: &RoomArena, sender: Identity, target: UserId, payload: SignalPayload) {
    let kind = payload.kind();
    forward(
        arena,
        target,
        kind,
        ServerEvent::Signal {
            sender_identity: sender,
            payload,
        },
    );
}

fn forward(arena: &RoomArena, target: UserId, kind: &'static str, event: ServerEvent) {
    match arena.resolve_connection(target) {
        Some(connection) if connection.deliver(event) => {
            metrics::record_signaling_forwarded(kind);
        }
        Some(_) => {
            debug!(
                target: "room.signaling",
                target_id = %target,
                kind,
                "Target connection not accepting events, dropping"
            );
            metrics::record_signaling_dropped(kind);
        }
        None => {
            debug!(
                target: "room.signaling",
                target_id = %target,
                kind,
                "Target not connected, dropping"
            );
            metrics::record_signaling_dropped(kind);
        }
    }
}
