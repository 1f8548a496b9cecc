//! Mailbox messages for the `RegistryActor`.
//!
//! Request/response messages carry a oneshot `respond_to`; notifications
//! (leave, disconnect, call signaling) do not.

use super::arena::JoinSnapshot;
use super::connection::ConnectionHandle;
use crate::errors::RoomError;

use common::protocol::{CallType, ChatMessage, RoomSnapshot, SignalPayload};
use common::types::{ConnectionId, Identity, RoomId, UserId};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::oneshot;

/// Messages handled by the `RegistryActor`.
#[derive(Debug)]
pub enum RegistryMessage {
    CreateRoom {
        owner: Identity,
        respond_to: oneshot::Sender<RoomId>,
    },

    GetRoom {
        room_id: RoomId,
        respond_to: oneshot::Sender<Result<RoomSnapshot, RoomError>>,
    },

    Join {
        room_id: RoomId,
        identity: Identity,
        connection: ConnectionHandle,
        respond_to: oneshot::Sender<Result<JoinSnapshot, RoomError>>,
    },

    Leave {
        room_id: RoomId,
        identity_id: UserId,
    },

    /// The connection closed; leave every room it is bound to.
    Disconnect {
        identity_id: UserId,
        connection_id: ConnectionId,
    },

    SendMessage {
        room_id: RoomId,
        sender: Identity,
        content: String,
        respond_to: oneshot::Sender<Result<ChatMessage, RoomError>>,
    },

    ResolveConnection {
        identity_id: UserId,
        respond_to: oneshot::Sender<Option<ConnectionHandle>>,
    },

    RequestCall {
        caller: Identity,
        room_id: RoomId,
        target: UserId,
        call_type: CallType,
    },

    RespondCall {
        responder: Identity,
        target: UserId,
        accepted: bool,
    },

    RelaySignal {
        sender: Identity,
        target: UserId,
        payload: SignalPayload,
    },

    GetStats {
        respond_to: oneshot::Sender<RegistryStats>,
    },

    /// Delete pending rooms older than `max_age`; responds with the count.
    SweepPendingRooms {
        max_age: Duration,
        respond_to: oneshot::Sender<usize>,
    },
}

/// Aggregate registry counts, reported by `/health`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub rooms: usize,
    pub participants: usize,
    pub messages: usize,
}
