//! `RoomArena` - the room, membership and message-log state.
//!
//! The arena is plain synchronous state owned by the `RegistryActor`. It
//! enforces the structural rules (no auto-create on join, rejoin replaces
//! the connection handle in place, eager deletion when the last participant
//! leaves) and leaves event delivery to its owner.

use super::connection::ConnectionHandle;
use super::messages::RegistryStats;
use crate::errors::RoomError;

use chrono::{DateTime, Utc};
use common::protocol::{ChatMessage, RoomSnapshot};
use common::types::{ConnectionId, Identity, MessageId, RoomId, UserId};
use std::collections::HashMap;

/// Full state returned to a joiner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinSnapshot {
    pub room: RoomSnapshot,
    pub messages: Vec<ChatMessage>,
}

/// Result of removing a participant from a room.
#[derive(Debug)]
pub struct LeaveOutcome {
    /// Connections of the members still in the room.
    pub remaining: Vec<ConnectionHandle>,
    /// Participant list after the removal.
    pub participants: Vec<Identity>,
    /// Whether the room was deleted because it became empty.
    pub room_deleted: bool,
}

#[derive(Debug)]
struct Participant {
    identity: Identity,
    connection: ConnectionHandle,
}

#[derive(Debug)]
struct RoomEntry {
    /// Creation sequence number, used to order rooms for connection lookup.
    seq: u64,
    owner_id: UserId,
    created_at: DateTime<Utc>,
    /// Members in join order.
    participants: Vec<Participant>,
    log: Vec<ChatMessage>,
}

impl RoomEntry {
    fn identities(&self) -> Vec<Identity> {
        self.participants
            .iter()
            .map(|p| p.identity.clone())
            .collect()
    }

    fn connections(&self) -> Vec<ConnectionHandle> {
        self.participants
            .iter()
            .map(|p| p.connection.clone())
            .collect()
    }

    fn snapshot(&self, id: &RoomId) -> RoomSnapshot {
        RoomSnapshot {
            id: id.clone(),
            owner_id: self.owner_id,
            created_at: self.created_at,
            participants: self.identities(),
        }
    }
}

/// All live rooms.
#[derive(Debug, Default)]
pub struct RoomArena {
    rooms: HashMap<RoomId, RoomEntry>,
    next_seq: u64,
}

impl RoomArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room owned by `owner` with a fresh random id.
    pub fn create_room(&mut self, owner: &Identity) -> RoomId {
        self.create_room_with(owner, RoomId::generate)
    }

    /// Create a room, drawing candidate ids from `generate` until one is
    /// unused.
    pub(crate) fn create_room_with(
        &mut self,
        owner: &Identity,
        mut generate: impl FnMut() -> RoomId,
    ) -> RoomId {
        let mut room_id = generate();
        while self.rooms.contains_key(&room_id) {
            room_id = generate();
        }

        self.next_seq += 1;
        self.rooms.insert(
            room_id.clone(),
            RoomEntry {
                seq: self.next_seq,
                owner_id: owner.id,
                created_at: Utc::now(),
                participants: Vec::new(),
                log: Vec::new(),
            },
        );

        room_id
    }

    /// Current snapshot of a room.
    #[must_use]
    pub fn snapshot(&self, room_id: &RoomId) -> Option<RoomSnapshot> {
        self.rooms.get(room_id).map(|room| room.snapshot(room_id))
    }

    /// Add `identity` to a room, or replace its connection if it is
    /// already a member.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::NotFound` if the room does not exist. The arena
    /// is left untouched in that case.
    pub fn join(
        &mut self,
        room_id: &RoomId,
        identity: Identity,
        connection: ConnectionHandle,
    ) -> Result<JoinSnapshot, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound("Room not found".to_string()))?;

        match room
            .participants
            .iter_mut()
            .find(|p| p.identity.id == identity.id)
        {
            Some(existing) => existing.connection = connection,
            None => room.participants.push(Participant {
                identity,
                connection,
            }),
        }

        Ok(JoinSnapshot {
            room: room.snapshot(room_id),
            messages: room.log.clone(),
        })
    }

    /// Remove `identity_id` from a room.
    ///
    /// Returns `None` if the room does not exist or the identity is not a
    /// member. When the last participant leaves, the room and its log are
    /// deleted in the same call.
    pub fn leave(&mut self, room_id: &RoomId, identity_id: UserId) -> Option<LeaveOutcome> {
        let room = self.rooms.get_mut(room_id)?;
        let position = room
            .participants
            .iter()
            .position(|p| p.identity.id == identity_id)?;
        room.participants.remove(position);

        if room.participants.is_empty() {
            self.rooms.remove(room_id);
            return Some(LeaveOutcome {
                remaining: Vec::new(),
                participants: Vec::new(),
                room_deleted: true,
            });
        }

        Some(LeaveOutcome {
            remaining: room.connections(),
            participants: room.identities(),
            room_deleted: false,
        })
    }

    /// Rooms where `identity_id` is a member through `connection_id`, in
    /// creation order.
    #[must_use]
    pub fn rooms_bound_to(&self, identity_id: UserId, connection_id: ConnectionId) -> Vec<RoomId> {
        let mut bound: Vec<(u64, RoomId)> = self
            .rooms
            .iter()
            .filter(|(_, room)| {
                room.participants.iter().any(|p| {
                    p.identity.id == identity_id && p.connection.connection_id() == connection_id
                })
            })
            .map(|(id, room)| (room.seq, id.clone()))
            .collect();
        bound.sort_by_key(|(seq, _)| *seq);
        bound.into_iter().map(|(_, id)| id).collect()
    }

    /// Append a message to a room's log with a server-assigned id and
    /// timestamp.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::NotFound` if the room does not exist.
    pub fn append_message(
        &mut self,
        room_id: &RoomId,
        sender: Identity,
        content: String,
    ) -> Result<ChatMessage, RoomError> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or_else(|| RoomError::NotFound("Room not found".to_string()))?;

        let message = ChatMessage {
            id: MessageId::new(),
            room_id: room_id.clone(),
            sender,
            content,
            timestamp: Utc::now(),
        };
        room.log.push(message.clone());

        Ok(message)
    }

    /// Connections of every current member of a room.
    #[must_use]
    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionHandle> {
        self.rooms
            .get(room_id)
            .map(RoomEntry::connections)
            .unwrap_or_default()
    }

    /// Connections of every member of a room other than `identity_id`.
    #[must_use]
    pub fn members_except(&self, room_id: &RoomId, identity_id: UserId) -> Vec<ConnectionHandle> {
        self.rooms
            .get(room_id)
            .map(|room| {
                room.participants
                    .iter()
                    .filter(|p| p.identity.id != identity_id)
                    .map(|p| p.connection.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Connection of a member of a room.
    #[must_use]
    pub fn member(&self, room_id: &RoomId, identity_id: UserId) -> Option<ConnectionHandle> {
        self.rooms.get(room_id).and_then(|room| {
            room.participants
                .iter()
                .find(|p| p.identity.id == identity_id)
                .map(|p| p.connection.clone())
        })
    }

    /// Find a connection for `identity_id`.
    ///
    /// An identity in several rooms may have several connections; the one
    /// stored in the earliest-created room wins.
    #[must_use]
    pub fn resolve_connection(&self, identity_id: UserId) -> Option<ConnectionHandle> {
        self.rooms
            .values()
            .filter_map(|room| {
                room.participants
                    .iter()
                    .find(|p| p.identity.id == identity_id)
                    .map(|p| (room.seq, &p.connection))
            })
            .min_by_key(|(seq, _)| *seq)
            .map(|(_, connection)| connection.clone())
    }

    /// Delete rooms that nobody has joined and that were created before
    /// `created_before`. Returns the deleted ids.
    pub fn sweep_pending(&mut self, created_before: DateTime<Utc>) -> Vec<RoomId> {
        let expired: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, room)| room.participants.is_empty() && room.created_at < created_before)
            .map(|(id, _)| id.clone())
            .collect();
        for room_id in &expired {
            self.rooms.remove(room_id);
        }
        expired
    }

    /// Number of live rooms.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Aggregate counts.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            rooms: self.rooms.len(),
            participants: self.rooms.values().map(|r| r.participants.len()).sum(),
            messages: self.rooms.values().map(|r| r.log.len()).sum(),
        }
    }
}
