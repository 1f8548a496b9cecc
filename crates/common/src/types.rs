//! Common data types for Huddle components.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Length of a room id in characters.
pub const ROOM_ID_LENGTH: usize = 8;

/// Unique identifier for a registered user (the identity id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Short identifier for a room.
///
/// Generated ids are the first [`ROOM_ID_LENGTH`] hex characters of a
/// random UUID. Ids received from clients are taken as-is; an id that
/// was never issued simply does not resolve to a room.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Generate a fresh candidate room id.
    ///
    /// Uniqueness against existing rooms is the registry's job.
    #[must_use]
    pub fn generate() -> Self {
        Self(
            Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ROOM_ID_LENGTH)
                .collect(),
        )
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    /// Create a new random message ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for one realtime connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    /// Create a new random connection ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// An authenticated principal.
///
/// Issued by the auth layer after token verification and immutable once
/// attached to a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Identity id (the registered user's id).
    pub id: UserId,
    /// Name shown to other participants.
    pub display_name: String,
}

impl Identity {
    /// Create an identity from its parts.
    #[must_use]
    pub fn new(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_has_expected_length() {
        let id = RoomId::generate();
        assert_eq!(id.as_str().len(), ROOM_ID_LENGTH);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_room_ids_differ() {
        let a = RoomId::generate();
        let b = RoomId::generate();
        // 32 bits of randomness; a collision here would be remarkable
        assert_ne!(a, b);
    }

    #[test]
    fn test_identity_serializes_camel_case() {
        let identity = Identity::new(UserId::new(), "alice");
        let json = serde_json::to_value(&identity).unwrap();

        assert_eq!(json["displayName"], "alice");
        assert_eq!(json["id"], identity.id.0.to_string());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let room = RoomId::from("abcd1234");
        assert_eq!(serde_json::to_string(&room).unwrap(), "\"abcd1234\"");

        let user = UserId::new();
        assert_eq!(
            serde_json::to_string(&user).unwrap(),
            format!("\"{}\"", user.0)
        );
    }
}
