//! Realtime wire protocol shared by the room service and its clients.
//!
//! Every frame is a JSON object of the form
//! `{"event": "<kebab-case-name>", "data": {...}}` with camelCase fields.
//! Frames are parsed into one tagged variant per event type at the
//! boundary; anything that does not parse is a [`ProtocolError`] and never
//! travels further inward.
//!
//! Signaling payloads (`offer`, `answer`, `ice-candidate`) are opaque to the
//! server: it checks their shape, never their contents.

use crate::types::{Identity, MessageId, RoomId, UserId};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum accepted size of one realtime frame (64 KiB).
///
/// Checked before JSON parsing. Large enough for SDP bodies, which are
/// typically a few KiB.
pub const MAX_EVENT_SIZE_BYTES: usize = 64 * 1024;

/// Errors produced while decoding or encoding realtime frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Frame exceeds [`MAX_EVENT_SIZE_BYTES`].
    #[error("Event exceeds maximum size of {MAX_EVENT_SIZE_BYTES} bytes")]
    TooLarge,

    /// Frame is not a known event with the expected fields.
    #[error("Malformed event: {0}")]
    Malformed(String),

    /// Frame was not UTF-8 JSON text.
    #[error("Unsupported frame type")]
    UnsupportedFrame,
}

/// Kind of media a call carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    /// Whether a call of this type captures video.
    #[must_use]
    pub const fn wants_video(self) -> bool {
        matches!(self, CallType::Video)
    }
}

/// A trickled ICE candidate, passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(
        rename = "sdpMLineIndex",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub sdp_m_line_index: Option<u16>,
}

/// WebRTC signaling payload exchanged between two endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalPayload {
    Offer { sdp: String },
    Answer { sdp: String },
    IceCandidate { candidate: IceCandidate },
}

impl SignalPayload {
    /// Short name for logs and metric labels.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            SignalPayload::Offer { .. } => "offer",
            SignalPayload::Answer { .. } => "answer",
            SignalPayload::IceCandidate { .. } => "ice-candidate",
        }
    }
}

/// Room state as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub owner_id: UserId,
    pub created_at: DateTime<Utc>,
    /// Current members in join order.
    pub participants: Vec<Identity>,
}

/// A chat message. Id and timestamp are always server-assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender: Identity,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// Events a client sends over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinRoom {
        room_id: RoomId,
    },
    LeaveRoom {
        room_id: RoomId,
    },
    SendMessage {
        room_id: RoomId,
        content: String,
    },
    Signal {
        target_identity_id: UserId,
        payload: SignalPayload,
    },
    CallUser {
        room_id: RoomId,
        target_identity_id: UserId,
        call_type: CallType,
    },
    CallResponse {
        target_identity_id: UserId,
        accepted: bool,
    },
}

impl ClientEvent {
    /// Wire name of the event, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "join-room",
            ClientEvent::LeaveRoom { .. } => "leave-room",
            ClientEvent::SendMessage { .. } => "send-message",
            ClientEvent::Signal { .. } => "signal",
            ClientEvent::CallUser { .. } => "call-user",
            ClientEvent::CallResponse { .. } => "call-response",
        }
    }
}

/// Events the server delivers over the realtime channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    RoomJoined {
        room: RoomSnapshot,
        messages: Vec<ChatMessage>,
    },
    ParticipantsUpdated {
        participants: Vec<Identity>,
    },
    UserJoined {
        identity: Identity,
    },
    UserLeft {
        identity_id: UserId,
    },
    NewMessage {
        message: ChatMessage,
    },
    Signal {
        sender_identity: Identity,
        payload: SignalPayload,
    },
    CallRequest {
        caller_identity: Identity,
        call_type: CallType,
    },
    CallResponse {
        identity_id: UserId,
        accepted: bool,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Wire name of the event, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            ServerEvent::RoomJoined { .. } => "room-joined",
            ServerEvent::ParticipantsUpdated { .. } => "participants-updated",
            ServerEvent::UserJoined { .. } => "user-joined",
            ServerEvent::UserLeft { .. } => "user-left",
            ServerEvent::NewMessage { .. } => "new-message",
            ServerEvent::Signal { .. } => "signal",
            ServerEvent::CallRequest { .. } => "call-request",
            ServerEvent::CallResponse { .. } => "call-response",
            ServerEvent::Error { .. } => "error",
        }
    }
}

/// Parse an inbound client frame.
///
/// # Errors
///
/// Returns `ProtocolError::TooLarge` for oversized frames and
/// `ProtocolError::Malformed` for anything that is not a known event.
pub fn parse_client_event(text: &str) -> Result<ClientEvent, ProtocolError> {
    parse_frame(text)
}

/// Parse an outbound server frame (client side).
///
/// # Errors
///
/// Same as [`parse_client_event`].
pub fn parse_server_event(text: &str) -> Result<ServerEvent, ProtocolError> {
    parse_frame(text)
}

/// Encode an event as a JSON text frame.
///
/// # Errors
///
/// Returns `ProtocolError::Malformed` if serialization fails.
pub fn encode_event<T: Serialize>(event: &T) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

fn parse_frame<T: DeserializeOwned>(text: &str) -> Result<T, ProtocolError> {
    if text.len() > MAX_EVENT_SIZE_BYTES {
        tracing::debug!(
            target: "common.protocol",
            size = text.len(),
            max_size = MAX_EVENT_SIZE_BYTES,
            "Frame rejected: size exceeds maximum allowed"
        );
        return Err(ProtocolError::TooLarge);
    }

    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}
