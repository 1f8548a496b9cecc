//! `RegistryActor` - owns every room, membership and message log.
//!
//! One actor task processes the mailbox one message at a time. Each
//! message runs to completion, including its fan-out, before the next one
//! is looked at, so two events touching the same room are never
//! interleaved and every member observes fan-outs in the same order.
//!
//! # Fan-out order
//!
//! - join: `room-joined` to the joiner, then `user-joined` to every other
//!   member, then `participants-updated` to all members
//! - leave: `user-left` then `participants-updated` to the remaining members

use super::arena::{JoinSnapshot, RoomArena};
use super::connection::ConnectionHandle;
use super::messages::{RegistryMessage, RegistryStats};
use super::{relay, signaling};
use crate::errors::RoomError;
use crate::observability::metrics;

use chrono::Utc;
use common::protocol::{CallType, ChatMessage, RoomSnapshot, ServerEvent, SignalPayload};
use common::types::{ConnectionId, Identity, RoomId, UserId};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1024;

/// Handle to the `RegistryActor`.
#[derive(Clone, Debug)]
pub struct RegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RegistryHandle {
    /// Create a room owned by `owner`. The room has no participants until
    /// its first join.
    pub async fn create_room(&self, owner: Identity) -> Result<RoomId, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::CreateRoom {
            owner,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Get the current snapshot of a room.
    pub async fn get_room(&self, room_id: RoomId) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::GetRoom {
            room_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Join a room.
    ///
    /// On success the joiner's connection has already been sent
    /// `room-joined` and the other members have been notified.
    pub async fn join(
        &self,
        room_id: RoomId,
        identity: Identity,
        connection: ConnectionHandle,
    ) -> Result<JoinSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::Join {
            room_id,
            identity,
            connection,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Leave a room. Leaving a room one is not in is a no-op.
    pub async fn leave(&self, room_id: RoomId, identity_id: UserId) -> Result<(), RoomError> {
        self.send(RegistryMessage::Leave {
            room_id,
            identity_id,
        })
        .await
    }

    /// Leave every room this connection is bound to.
    pub async fn disconnect(
        &self,
        identity_id: UserId,
        connection_id: ConnectionId,
    ) -> Result<(), RoomError> {
        self.send(RegistryMessage::Disconnect {
            identity_id,
            connection_id,
        })
        .await
    }

    /// Relay a chat message to a room.
    pub async fn send_message(
        &self,
        room_id: RoomId,
        sender: Identity,
        content: String,
    ) -> Result<ChatMessage, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::SendMessage {
            room_id,
            sender,
            content,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Find the connection an identity can be reached on.
    pub async fn resolve_connection(
        &self,
        identity_id: UserId,
    ) -> Result<ConnectionHandle, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::ResolveConnection {
            identity_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
            .ok_or_else(|| RoomError::NotFound("Identity not connected".to_string()))
    }

    /// Ask `target` to start a call.
    pub async fn request_call(
        &self,
        caller: Identity,
        room_id: RoomId,
        target: UserId,
        call_type: CallType,
    ) -> Result<(), RoomError> {
        self.send(RegistryMessage::RequestCall {
            caller,
            room_id,
            target,
            call_type,
        })
        .await
    }

    /// Answer a call request from `target`.
    pub async fn respond_call(
        &self,
        responder: Identity,
        target: UserId,
        accepted: bool,
    ) -> Result<(), RoomError> {
        self.send(RegistryMessage::RespondCall {
            responder,
            target,
            accepted,
        })
        .await
    }

    /// Relay a signaling payload to `target`.
    pub async fn relay_signal(
        &self,
        sender: Identity,
        target: UserId,
        payload: SignalPayload,
    ) -> Result<(), RoomError> {
        self.send(RegistryMessage::RelaySignal {
            sender,
            target,
            payload,
        })
        .await
    }

    /// Get aggregate counts.
    pub async fn stats(&self) -> Result<RegistryStats, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::GetStats { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Delete rooms created more than `max_age` ago that nobody has joined.
    /// Returns how many were deleted.
    pub async fn sweep_pending_rooms(&self, max_age: Duration) -> Result<usize, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::SweepPendingRooms {
            max_age,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the registry actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: RegistryMessage) -> Result<(), RoomError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| RoomError::Internal(format!("channel send failed: {e}")))
    }
}

/// The `RegistryActor` implementation.
pub struct RegistryActor {
    /// Message receiver.
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Cancellation token.
    cancel_token: CancellationToken,
    /// All room state.
    arena: RoomArena,
    /// Messages processed, for the shutdown log.
    messages_processed: u64,
}

impl RegistryActor {
    /// Spawn the registry actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(cancel_token: CancellationToken) -> (RegistryHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);

        let actor = Self {
            receiver,
            cancel_token: cancel_token.clone(),
            arena: RoomArena::new(),
            messages_processed: 0,
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RegistryHandle {
            sender,
            cancel_token,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "room.actor.registry")]
    async fn run(mut self) {
        info!(target: "room.actor.registry", "RegistryActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.actor.registry",
                        "RegistryActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message);
                            self.messages_processed += 1;
                        }
                        None => {
                            info!(
                                target: "room.actor.registry",
                                "RegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        let stats = self.arena.stats();
        info!(
            target: "room.actor.registry",
            rooms = stats.rooms,
            participants = stats.participants,
            messages_processed = self.messages_processed,
            "RegistryActor stopped"
        );
    }

    /// Handle a single message.
    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::CreateRoom { owner, respond_to } => {
                let room_id = self.arena.create_room(&owner);
                info!(
                    target: "room.actor.registry",
                    room_id = %room_id,
                    owner_id = %owner.id,
                    "Room created"
                );
                metrics::record_room_created();
                metrics::set_rooms_active(self.arena.room_count());
                let _ = respond_to.send(room_id);
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let result = self
                    .arena
                    .snapshot(&room_id)
                    .ok_or_else(|| RoomError::NotFound("Room not found".to_string()));
                let _ = respond_to.send(result);
            }

            RegistryMessage::Join {
                room_id,
                identity,
                connection,
                respond_to,
            } => {
                let result = self.handle_join(&room_id, identity, connection);
                let _ = respond_to.send(result);
            }

            RegistryMessage::Leave {
                room_id,
                identity_id,
            } => {
                self.handle_leave(&room_id, identity_id);
            }

            RegistryMessage::Disconnect {
                identity_id,
                connection_id,
            } => {
                self.handle_disconnect(identity_id, connection_id);
            }

            RegistryMessage::SendMessage {
                room_id,
                sender,
                content,
                respond_to,
            } => {
                let result = relay::relay_message(&mut self.arena, &room_id, sender, content);
                let _ = respond_to.send(result);
            }

            RegistryMessage::ResolveConnection {
                identity_id,
                respond_to,
            } => {
                let _ = respond_to.send(self.arena.resolve_connection(identity_id));
            }

            RegistryMessage::RequestCall {
                caller,
                room_id,
                target,
                call_type,
            } => {
                signaling::request_call(&self.arena, caller, &room_id, target, call_type);
            }

            RegistryMessage::RespondCall {
                responder,
                target,
                accepted,
            } => {
                signaling::respond_call(&self.arena, &responder, target, accepted);
            }

            RegistryMessage::RelaySignal {
                sender,
                target,
                payload,
            } => {
                signaling::relay_signal(&self.arena, sender, target, payload);
            }

            RegistryMessage::GetStats { respond_to } => {
                let _ = respond_to.send(self.arena.stats());
            }

            RegistryMessage::SweepPendingRooms {
                max_age,
                respond_to,
            } => {
                let _ = respond_to.send(self.handle_sweep(max_age));
            }
        }
    }

    fn handle_sweep(&mut self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let swept = self.arena.sweep_pending(cutoff);
        if swept.is_empty() {
            return 0;
        }

        for room_id in &swept {
            debug!(target: "room.actor.registry", room_id = %room_id, "Pending room expired");
        }
        info!(
            target: "room.actor.registry",
            count = swept.len(),
            "Deleted pending rooms nobody joined"
        );
        metrics::record_pending_rooms_swept(swept.len());
        metrics::set_rooms_active(self.arena.room_count());
        swept.len()
    }

    fn handle_join(
        &mut self,
        room_id: &RoomId,
        identity: Identity,
        connection: ConnectionHandle,
    ) -> Result<JoinSnapshot, RoomError> {
        let joiner_id = identity.id;
        let snapshot = match self.arena.join(room_id, identity.clone(), connection.clone()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!(
                    target: "room.actor.registry",
                    room_id = %room_id,
                    identity_id = %joiner_id,
                    "Join rejected: room not found"
                );
                metrics::record_join("not_found");
                return Err(e);
            }
        };

        connection.deliver(ServerEvent::RoomJoined {
            room: snapshot.room.clone(),
            messages: snapshot.messages.clone(),
        });

        for member in self.arena.members_except(room_id, joiner_id) {
            member.deliver(ServerEvent::UserJoined {
                identity: identity.clone(),
            });
        }
        for member in self.arena.members(room_id) {
            member.deliver(ServerEvent::ParticipantsUpdated {
                participants: snapshot.room.participants.clone(),
            });
        }

        info!(
            target: "room.actor.registry",
            room_id = %room_id,
            identity_id = %joiner_id,
            connection_id = %connection.connection_id(),
            participants = snapshot.room.participants.len(),
            "Participant joined"
        );
        metrics::record_join("joined");

        Ok(snapshot)
    }

    fn handle_leave(&mut self, room_id: &RoomId, identity_id: UserId) {
        let Some(outcome) = self.arena.leave(room_id, identity_id) else {
            debug!(
                target: "room.actor.registry",
                room_id = %room_id,
                identity_id = %identity_id,
                "Leave ignored: not a member"
            );
            return;
        };

        for member in &outcome.remaining {
            member.deliver(ServerEvent::UserLeft { identity_id });
        }
        for member in &outcome.remaining {
            member.deliver(ServerEvent::ParticipantsUpdated {
                participants: outcome.participants.clone(),
            });
        }

        info!(
            target: "room.actor.registry",
            room_id = %room_id,
            identity_id = %identity_id,
            remaining = outcome.participants.len(),
            room_deleted = outcome.room_deleted,
            "Participant left"
        );

        if outcome.room_deleted {
            metrics::set_rooms_active(self.arena.room_count());
        }
    }

    fn handle_disconnect(&mut self, identity_id: UserId, connection_id: ConnectionId) {
        let rooms = self.arena.rooms_bound_to(identity_id, connection_id);
        debug!(
            target: "room.actor.registry",
            identity_id = %identity_id,
            connection_id = %connection_id,
            rooms = rooms.len(),
            "Connection disconnected"
        );

        for room_id in rooms {
            self.handle_leave(&room_id, identity_id);
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    struct TestMember {
        identity: Identity,
        connection: ConnectionHandle,
        rx: mpsc::Receiver<ServerEvent>,
    }

    impl TestMember {
        fn new(name: &str) -> Self {
            Self::with_identity(Identity::new(UserId::new(), name))
        }

        /// A second connection for an existing identity.
        fn with_identity(identity: Identity) -> Self {
            let (connection, rx) =
                ConnectionHandle::channel(identity.id, 64, CancellationToken::new());
            Self {
                identity,
                connection,
                rx,
            }
        }

        async fn next(&mut self) -> ServerEvent {
            tokio::time::timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("timed out waiting for event")
                .expect("connection queue closed")
        }

        fn assert_idle(&mut self) {
            assert!(self.rx.try_recv().is_err(), "expected no pending events");
        }
    }

    fn spawn() -> (RegistryHandle, CancellationToken) {
        let token = CancellationToken::new();
        let (handle, _task) = RegistryActor::spawn(token.clone());
        (handle, token)
    }

    #[tokio::test]
    async fn test_registry_actor_spawn_and_cancel() {
        let (handle, token) = spawn();

        assert!(!handle.is_cancelled());
        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_join_missing_room_returns_not_found() {
        let (handle, _token) = spawn();
        let mut alice = TestMember::new("alice");

        let result = handle
            .join(
                RoomId::from("missing0"),
                alice.identity.clone(),
                alice.connection.clone(),
            )
            .await;

        assert!(matches!(result, Err(RoomError::NotFound(_))));
        assert_eq!(handle.stats().await.unwrap().rooms, 0);
        alice.assert_idle();
    }

    #[tokio::test]
    async fn test_join_fan_out_order() {
        let (handle, _token) = spawn();
        let mut alice = TestMember::new("alice");
        let mut bob = TestMember::new("bob");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();

        handle
            .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
            .await
            .unwrap();
        assert!(matches!(alice.next().await, ServerEvent::RoomJoined { .. }));
        assert!(matches!(
            alice.next().await,
            ServerEvent::ParticipantsUpdated { .. }
        ));

        let snapshot = handle
            .join(room_id.clone(), bob.identity.clone(), bob.connection.clone())
            .await
            .unwrap();
        assert_eq!(
            snapshot.room.participants,
            vec![alice.identity.clone(), bob.identity.clone()]
        );

        // Joiner: room-joined, then the full participant list
        match bob.next().await {
            ServerEvent::RoomJoined { room, messages } => {
                assert_eq!(room.id, room_id);
                assert!(messages.is_empty());
            }
            other => panic!("expected room-joined, got {other:?}"),
        }
        match bob.next().await {
            ServerEvent::ParticipantsUpdated { participants } => {
                assert_eq!(participants.len(), 2);
            }
            other => panic!("expected participants-updated, got {other:?}"),
        }

        // Existing member: user-joined, then the full participant list
        assert_eq!(
            alice.next().await,
            ServerEvent::UserJoined {
                identity: bob.identity.clone()
            }
        );
        match alice.next().await {
            ServerEvent::ParticipantsUpdated { participants } => {
                assert_eq!(participants, vec![alice.identity.clone(), bob.identity.clone()]);
            }
            other => panic!("expected participants-updated, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_rejoin_does_not_duplicate_participant() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();

        handle
            .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
            .await
            .unwrap();
        let replacement = TestMember::with_identity(alice.identity.clone());
        let snapshot = handle
            .join(
                room_id.clone(),
                replacement.identity.clone(),
                replacement.connection.clone(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.room.participants.len(), 1);
        let resolved = handle.resolve_connection(alice.identity.id).await.unwrap();
        assert_eq!(
            resolved.connection_id(),
            replacement.connection.connection_id()
        );
    }

    #[tokio::test]
    async fn test_last_leave_deletes_room() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();
        handle
            .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
            .await
            .unwrap();

        handle
            .leave(room_id.clone(), alice.identity.id)
            .await
            .unwrap();

        let result = handle.get_room(room_id.clone()).await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));

        // Rejoining a deleted room is NotFound, never a resurrection
        let result = handle
            .join(room_id, alice.identity.clone(), alice.connection.clone())
            .await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_members() {
        let (handle, _token) = spawn();
        let mut alice = TestMember::new("alice");
        let bob = TestMember::new("bob");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();
        handle
            .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
            .await
            .unwrap();
        handle
            .join(room_id.clone(), bob.identity.clone(), bob.connection.clone())
            .await
            .unwrap();
        // room-joined, participants-updated, user-joined, participants-updated
        for _ in 0..4 {
            alice.next().await;
        }

        handle.leave(room_id.clone(), bob.identity.id).await.unwrap();
        handle.leave(room_id.clone(), bob.identity.id).await.unwrap();

        assert_eq!(
            alice.next().await,
            ServerEvent::UserLeft {
                identity_id: bob.identity.id
            }
        );
        assert_eq!(
            alice.next().await,
            ServerEvent::ParticipantsUpdated {
                participants: vec![alice.identity.clone()]
            }
        );

        // The second leave was a no-op
        handle.stats().await.unwrap();
        alice.assert_idle();
    }

    #[tokio::test]
    async fn test_disconnect_leaves_every_bound_room() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");
        let mut bob = TestMember::new("bob");
        let first = handle.create_room(alice.identity.clone()).await.unwrap();
        let second = handle.create_room(alice.identity.clone()).await.unwrap();

        for room_id in [&first, &second] {
            handle
                .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
                .await
                .unwrap();
        }
        handle
            .join(first.clone(), bob.identity.clone(), bob.connection.clone())
            .await
            .unwrap();
        // room-joined, participants-updated
        bob.next().await;
        bob.next().await;

        handle
            .disconnect(alice.identity.id, alice.connection.connection_id())
            .await
            .unwrap();

        assert_eq!(
            bob.next().await,
            ServerEvent::UserLeft {
                identity_id: alice.identity.id
            }
        );
        assert!(matches!(
            handle.get_room(second).await,
            Err(RoomError::NotFound(_))
        ));
        let stats = handle.stats().await.unwrap();
        assert_eq!(stats.rooms, 1);
        assert_eq!(stats.participants, 1);
    }

    #[tokio::test]
    async fn test_stale_disconnect_keeps_newer_connection() {
        let (handle, _token) = spawn();
        let old = TestMember::new("alice");
        let new = TestMember::with_identity(old.identity.clone());
        let room_id = handle.create_room(old.identity.clone()).await.unwrap();

        handle
            .join(room_id.clone(), old.identity.clone(), old.connection.clone())
            .await
            .unwrap();
        handle
            .join(room_id.clone(), new.identity.clone(), new.connection.clone())
            .await
            .unwrap();

        handle
            .disconnect(old.identity.id, old.connection.connection_id())
            .await
            .unwrap();

        let room = handle.get_room(room_id).await.unwrap();
        assert_eq!(room.participants, vec![old.identity.clone()]);
    }

    #[tokio::test]
    async fn test_send_message_fan_out_and_log() {
        let (handle, _token) = spawn();
        let mut alice = TestMember::new("alice");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();
        handle
            .join(room_id.clone(), alice.identity.clone(), alice.connection.clone())
            .await
            .unwrap();
        alice.next().await;
        alice.next().await;

        let message = handle
            .send_message(room_id.clone(), alice.identity.clone(), "hi".to_string())
            .await
            .unwrap();
        assert_eq!(
            alice.next().await,
            ServerEvent::NewMessage {
                message: message.clone()
            }
        );

        let late = TestMember::new("late");
        let snapshot = handle
            .join(room_id, late.identity.clone(), late.connection.clone())
            .await
            .unwrap();
        assert_eq!(snapshot.messages, vec![message]);
    }

    #[tokio::test]
    async fn test_send_message_to_missing_room() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");

        let result = handle
            .send_message(RoomId::from("missing0"), alice.identity, "hi".to_string())
            .await;

        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_resolve_connection_not_found() {
        let (handle, _token) = spawn();

        let result = handle.resolve_connection(UserId::new()).await;

        assert!(matches!(result, Err(RoomError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_signal_relay_through_handle() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");
        let mut bob = TestMember::new("bob");
        let room_id = handle.create_room(alice.identity.clone()).await.unwrap();
        for member in [&alice, &bob] {
            handle
                .join(
                    room_id.clone(),
                    member.identity.clone(),
                    member.connection.clone(),
                )
                .await
                .unwrap();
        }
        // room-joined, participants-updated
        bob.next().await;
        bob.next().await;

        handle
            .request_call(
                alice.identity.clone(),
                room_id,
                bob.identity.id,
                CallType::Audio,
            )
            .await
            .unwrap();
        handle
            .relay_signal(
                alice.identity.clone(),
                bob.identity.id,
                SignalPayload::Offer {
                    sdp: "v=0".to_string(),
                },
            )
            .await
            .unwrap();

        assert!(matches!(bob.next().await, ServerEvent::CallRequest { .. }));
        assert!(matches!(bob.next().await, ServerEvent::Signal { .. }));
    }

    #[tokio::test]
    async fn test_sweep_pending_rooms_through_handle() {
        let (handle, _token) = spawn();
        let alice = TestMember::new("alice");
        let pending = handle.create_room(alice.identity.clone()).await.unwrap();
        let joined = handle.create_room(alice.identity.clone()).await.unwrap();
        handle
            .join(
                joined.clone(),
                alice.identity.clone(),
                alice.connection.clone(),
            )
            .await
            .unwrap();

        assert_eq!(
            handle
                .sweep_pending_rooms(Duration::from_secs(3600))
                .await
                .unwrap(),
            0
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(handle.sweep_pending_rooms(Duration::ZERO).await.unwrap(), 1);

        assert!(matches!(
            handle.get_room(pending).await,
            Err(RoomError::NotFound(_))
        ));
        assert!(handle.get_room(joined).await.is_ok());
    }

    #[tokio::test]
    async fn test_handle_errors_after_shutdown() {
        let token = CancellationToken::new();
        let (handle, task) = RegistryActor::spawn(token.clone());

        token.cancel();
        task.await.unwrap();

        let result = handle.create_room(Identity::new(UserId::new(), "alice")).await;
        assert!(matches!(result, Err(RoomError::Internal(_))));
    }
}
