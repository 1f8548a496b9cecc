//! `CallSessionActor` - serializes everything that touches a `CallSession`.
//!
//! UI commands, realtime events and peer connection events all land in one
//! task, so a remote answer can never race a local `end_call` and candidate
//! order is the order the link sees them.

use crate::errors::CallError;
use crate::media::MediaDevices;
use crate::peer::{PeerConnectionFactory, PeerEvent};
use crate::session::{CallSession, CallSnapshot};
use crate::signaling::SignalingSink;
use common::protocol::{CallType, ServerEvent};
use common::types::{RoomId, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for commands and realtime events.
const CALL_CHANNEL_BUFFER: usize = 256;

/// Commands issued by the local user.
#[derive(Debug)]
pub enum CallCommand {
    StartCall {
        room_id: RoomId,
        target: UserId,
        call_type: CallType,
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    AcceptCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    RejectCall {
        respond_to: oneshot::Sender<Result<(), CallError>>,
    },
    ToggleMute {
        respond_to: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleCamera {
        respond_to: oneshot::Sender<Result<bool, CallError>>,
    },
    ToggleScreenShare {
        respond_to: oneshot::Sender<Result<bool, CallError>>,
    },
    EndCall {
        respond_to: oneshot::Sender<()>,
    },
    GetSnapshot {
        respond_to: oneshot::Sender<CallSnapshot>,
    },
}

/// Handle to a `CallSessionActor`.
#[derive(Clone, Debug)]
pub struct CallSessionHandle {
    commands: mpsc::Sender<CallCommand>,
    server_events: mpsc::Sender<ServerEvent>,
    cancel_token: CancellationToken,
}

impl CallSessionHandle {
    /// Call `target` in `room_id`.
    ///
    /// # Errors
    ///
    /// See [`CallSession::start_call`].
    pub async fn start_call(
        &self,
        room_id: RoomId,
        target: UserId,
        call_type: CallType,
    ) -> Result<(), CallError> {
        self.request(|respond_to| CallCommand::StartCall {
            room_id,
            target,
            call_type,
            respond_to,
        })
        .await?
    }

    /// # Errors
    ///
    /// See [`CallSession::accept_call`].
    pub async fn accept_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| CallCommand::AcceptCall { respond_to })
            .await?
    }

    /// # Errors
    ///
    /// See [`CallSession::reject_call`].
    pub async fn reject_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| CallCommand::RejectCall { respond_to })
            .await?
    }

    /// Returns the new muted state.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` without local media.
    pub async fn toggle_mute(&self) -> Result<bool, CallError> {
        self.request(|respond_to| CallCommand::ToggleMute { respond_to })
            .await?
    }

    /// Returns the new camera-off state.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` without local media.
    pub async fn toggle_camera(&self) -> Result<bool, CallError> {
        self.request(|respond_to| CallCommand::ToggleCamera { respond_to })
            .await?
    }

    /// Returns the new screen-sharing state.
    ///
    /// # Errors
    ///
    /// See [`CallSession::toggle_screen_share`].
    pub async fn toggle_screen_share(&self) -> Result<bool, CallError> {
        self.request(|respond_to| CallCommand::ToggleScreenShare { respond_to })
            .await?
    }

    /// End the call. Safe to call in any state.
    ///
    /// # Errors
    ///
    /// `CallError::Connectivity` if the actor is gone.
    pub async fn end_call(&self) -> Result<(), CallError> {
        self.request(|respond_to| CallCommand::EndCall { respond_to })
            .await
    }

    /// # Errors
    ///
    /// `CallError::Connectivity` if the actor is gone.
    pub async fn snapshot(&self) -> Result<CallSnapshot, CallError> {
        self.request(|respond_to| CallCommand::GetSnapshot { respond_to })
            .await
    }

    /// Feed an event received from the realtime channel.
    ///
    /// # Errors
    ///
    /// `CallError::Connectivity` if the actor is gone.
    pub async fn deliver(&self, event: ServerEvent) -> Result<(), CallError> {
        self.server_events
            .send(event)
            .await
            .map_err(|e| CallError::Connectivity(format!("channel send failed: {e}")))
    }

    /// Sender for the realtime reader to push events into directly.
    #[must_use]
    pub fn server_event_sender(&self) -> mpsc::Sender<ServerEvent> {
        self.server_events.clone()
    }

    /// Cancel the actor. The call is ended on the way out.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> CallCommand,
    ) -> Result<T, CallError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|e| CallError::Connectivity(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| CallError::Connectivity(format!("response receive failed: {e}")))
    }
}

/// The `CallSessionActor` implementation.
pub struct CallSessionActor {
    session: CallSession,
    commands: mpsc::Receiver<CallCommand>,
    server_events: mpsc::Receiver<ServerEvent>,
    peer_events: mpsc::UnboundedReceiver<PeerEvent>,
    cancel_token: CancellationToken,
}

impl CallSessionActor {
    /// Spawn a call session actor.
    ///
    /// Returns a handle and the task join handle.
    pub fn spawn(
        devices: Arc<dyn MediaDevices>,
        peers: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingSink>,
        cancel_token: CancellationToken,
    ) -> (CallSessionHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(CALL_CHANNEL_BUFFER);
        let (server_tx, server_rx) = mpsc::channel(CALL_CHANNEL_BUFFER);
        let (peer_tx, peer_rx) = mpsc::unbounded_channel();

        let actor = Self {
            session: CallSession::new(devices, peers, signaling, peer_tx),
            commands: command_rx,
            server_events: server_rx,
            peer_events: peer_rx,
            cancel_token: cancel_token.clone(),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = CallSessionHandle {
            commands: command_tx,
            server_events: server_tx,
            cancel_token,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "call.actor.session")]
    async fn run(mut self) {
        debug!(target: "call.actor.session", "CallSessionActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "call.actor.session",
                        "CallSessionActor received cancellation signal"
                    );
                    break;
                }

                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        None => {
                            debug!(
                                target: "call.actor.session",
                                "All handles dropped, exiting"
                            );
                            break;
                        }
                    }
                }

                Some(event) = self.server_events.recv() => {
                    if let Err(e) = self.session.handle_server_event(event).await {
                        warn!(target: "call.actor.session", error = %e, "Realtime event failed");
                    }
                }

                Some(event) = self.peer_events.recv() => {
                    if let Err(e) = self.session.handle_peer_event(event) {
                        warn!(target: "call.actor.session", error = %e, "Peer event failed");
                    }
                }
            }
        }

        self.session.end_call();
        debug!(
            target: "call.actor.session",
            state = self.session.state().name(),
            "CallSessionActor stopped"
        );
    }

    async fn handle_command(&mut self, command: CallCommand) {
        match command {
            CallCommand::StartCall {
                room_id,
                target,
                call_type,
                respond_to,
            } => {
                let result = self.session.start_call(room_id, target, call_type).await;
                let _ = respond_to.send(result);
            }
            CallCommand::AcceptCall { respond_to } => {
                let result = self.session.accept_call().await;
                let _ = respond_to.send(result);
            }
            CallCommand::RejectCall { respond_to } => {
                let _ = respond_to.send(self.session.reject_call());
            }
            CallCommand::ToggleMute { respond_to } => {
                let _ = respond_to.send(self.session.toggle_mute());
            }
            CallCommand::ToggleCamera { respond_to } => {
                let _ = respond_to.send(self.session.toggle_camera());
            }
            CallCommand::ToggleScreenShare { respond_to } => {
                let result = self.session.toggle_screen_share().await;
                let _ = respond_to.send(result);
            }
            CallCommand::EndCall { respond_to } => {
                self.session.end_call();
                let _ = respond_to.send(());
            }
            CallCommand::GetSnapshot { respond_to } => {
                let _ = respond_to.send(self.session.snapshot());
            }
        }
    }
}
