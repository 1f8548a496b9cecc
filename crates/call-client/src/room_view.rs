//! Client-side view of the current room and its chat.

use crate::errors::CallError;
use common::protocol::{ChatMessage, ClientEvent, RoomSnapshot, ServerEvent};
use common::types::RoomId;

/// The room this client is in, kept current from realtime events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomView {
    pub current_room: Option<RoomSnapshot>,
    pub messages: Vec<ChatMessage>,
    pub is_joining: bool,
    pub last_error: Option<String>,
}

impl RoomView {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn room_id(&self) -> Option<&RoomId> {
        self.current_room.as_ref().map(|room| &room.id)
    }

    /// Start joining `room_id`. Returns the event to send.
    pub fn join(&mut self, room_id: RoomId) -> ClientEvent {
        self.is_joining = true;
        self.last_error = None;
        ClientEvent::JoinRoom { room_id }
    }

    /// Forget the current room. Returns the event to send, if in one.
    pub fn leave(&mut self) -> Option<ClientEvent> {
        let room = self.current_room.take()?;
        self.messages.clear();
        Some(ClientEvent::LeaveRoom { room_id: room.id })
    }

    /// Build a chat message for the current room.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` when not in a room.
    pub fn send_message(&self, content: impl Into<String>) -> Result<ClientEvent, CallError> {
        let room_id = self
            .room_id()
            .ok_or_else(|| CallError::InvalidState("not in a room".to_string()))?;
        Ok(ClientEvent::SendMessage {
            room_id: room_id.clone(),
            content: content.into(),
        })
    }

    /// Fold a realtime event into the view.
    pub fn apply(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::RoomJoined { room, messages } => {
                self.current_room = Some(room.clone());
                self.messages = messages.clone();
                self.is_joining = false;
                self.last_error = None;
            }
            ServerEvent::ParticipantsUpdated { participants } => {
                if let Some(room) = self.current_room.as_mut() {
                    room.participants = participants.clone();
                }
            }
            ServerEvent::UserJoined { identity } => {
                if let Some(room) = self.current_room.as_mut() {
                    if !room.participants.iter().any(|p| p.id == identity.id) {
                        room.participants.push(identity.clone());
                    }
                }
            }
            ServerEvent::UserLeft { identity_id } => {
                if let Some(room) = self.current_room.as_mut() {
                    room.participants.retain(|p| p.id != *identity_id);
                }
            }
            ServerEvent::NewMessage { message } => {
                if self.room_id() == Some(&message.room_id) {
                    self.messages.push(message.clone());
                }
            }
            ServerEvent::Error { message } => {
                self.last_error = Some(message.clone());
                self.is_joining = false;
            }
            ServerEvent::Signal { .. }
            | ServerEvent::CallRequest { .. }
            | ServerEvent::CallResponse { .. } => {}
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use chrono::Utc;
    use common::types::{Identity, MessageId, UserId};

    fn identity(name: &str) -> Identity {
        Identity::new(UserId::new(), name)
    }

    fn joined(view: &mut RoomView, room_id: &str, participants: Vec<Identity>) {
        view.apply(&ServerEvent::RoomJoined {
            room: RoomSnapshot {
                id: RoomId::from(room_id),
                owner_id: UserId::new(),
                created_at: Utc::now(),
                participants,
            },
            messages: vec![],
        });
    }

    fn message(room_id: &str, content: &str) -> ChatMessage {
        ChatMessage {
            id: MessageId::new(),
            room_id: RoomId::from(room_id),
            sender: identity("bob"),
            content: content.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_join_then_room_joined() {
        let mut view = RoomView::new();

        let event = view.join(RoomId::from("abcd1234"));
        assert_eq!(
            event,
            ClientEvent::JoinRoom {
                room_id: RoomId::from("abcd1234")
            }
        );
        assert!(view.is_joining);

        joined(&mut view, "abcd1234", vec![identity("alice")]);

        assert!(!view.is_joining);
        assert_eq!(view.room_id(), Some(&RoomId::from("abcd1234")));
    }

    #[test]
    fn test_join_error_clears_joining() {
        let mut view = RoomView::new();
        let _ = view.join(RoomId::from("missing1"));

        view.apply(&ServerEvent::Error {
            message: "Room not found".to_string(),
        });

        assert!(!view.is_joining);
        assert_eq!(view.last_error.as_deref(), Some("Room not found"));
        assert!(view.current_room.is_none());
    }

    #[test]
    fn test_membership_events() {
        let mut view = RoomView::new();
        let alice = identity("alice");
        let bob = identity("bob");
        joined(&mut view, "abcd1234", vec![alice.clone()]);

        view.apply(&ServerEvent::UserJoined {
            identity: bob.clone(),
        });
        view.apply(&ServerEvent::UserJoined {
            identity: bob.clone(),
        });
        assert_eq!(
            view.current_room.as_ref().unwrap().participants,
            vec![alice.clone(), bob.clone()]
        );

        view.apply(&ServerEvent::UserLeft {
            identity_id: alice.id,
        });
        assert_eq!(
            view.current_room.as_ref().unwrap().participants,
            vec![bob.clone()]
        );

        view.apply(&ServerEvent::ParticipantsUpdated {
            participants: vec![bob.clone(), alice.clone()],
        });
        assert_eq!(
            view.current_room.as_ref().unwrap().participants,
            vec![bob, alice]
        );
    }

    #[test]
    fn test_messages_for_other_rooms_are_ignored() {
        let mut view = RoomView::new();
        joined(&mut view, "abcd1234", vec![]);

        view.apply(&ServerEvent::NewMessage {
            message: message("abcd1234", "hi"),
        });
        view.apply(&ServerEvent::NewMessage {
            message: message("zzzz9999", "elsewhere"),
        });

        assert_eq!(view.messages.len(), 1);
        assert_eq!(view.messages[0].content, "hi");
    }

    #[test]
    fn test_send_and_leave() {
        let mut view = RoomView::new();
        assert!(matches!(
            view.send_message("hello"),
            Err(CallError::InvalidState(_))
        ));
        assert!(view.leave().is_none());

        joined(&mut view, "abcd1234", vec![]);
        assert_eq!(
            view.send_message("hello").unwrap(),
            ClientEvent::SendMessage {
                room_id: RoomId::from("abcd1234"),
                content: "hello".to_string()
            }
        );

        assert_eq!(
            view.leave(),
            Some(ClientEvent::LeaveRoom {
                room_id: RoomId::from("abcd1234")
            })
        );
        assert!(view.current_room.is_none());
        assert!(view.messages.is_empty());
    }
}
