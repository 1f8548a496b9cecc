//! One realtime session per accepted socket.
//!
//! The read loop parses each text frame into a `ClientEvent` and dispatches
//! it to the registry. A dedicated writer task drains the connection's
//! outbound queue to the socket. When the socket closes, errors, or the
//! connection is cancelled (eviction or shutdown), exactly one
//! `disconnect` is sent to the registry.

use crate::errors::RoomError;
use crate::observability::metrics;
use crate::registry::{ConnectionHandle, RegistryHandle};

use axum::extract::ws::{Message, WebSocket};
use common::protocol::{encode_event, parse_client_event, ClientEvent, ProtocolError, ServerEvent};
use common::types::Identity;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// What the read loop does after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    Continue,
    Close,
}

/// Per-connection session state.
pub struct Session {
    identity: Identity,
    registry: RegistryHandle,
    connection: ConnectionHandle,
    outbound: mpsc::Receiver<ServerEvent>,
    cancel_token: CancellationToken,
}

impl Session {
    /// Create a session for an authenticated identity.
    #[must_use]
    pub fn new(
        identity: Identity,
        registry: RegistryHandle,
        buffer: usize,
        cancel_token: CancellationToken,
    ) -> Self {
        let (connection, outbound) =
            ConnectionHandle::channel(identity.id, buffer, cancel_token.clone());
        Self {
            identity,
            registry,
            connection,
            outbound,
            cancel_token,
        }
    }

    /// This session's connection handle.
    #[must_use]
    pub fn connection(&self) -> &ConnectionHandle {
        &self.connection
    }

    /// Run the session until the socket closes or the connection is
    /// cancelled.
    #[instrument(
        skip_all,
        name = "room.gateway.session",
        fields(
            identity_id = %self.identity.id,
            connection_id = %self.connection.connection_id(),
        )
    )]
    pub async fn run(self, socket: WebSocket) {
        let Session {
            identity,
            registry,
            connection,
            outbound,
            cancel_token,
        } = self;

        metrics::record_connection_opened();
        info!(target: "room.gateway", "Session started");

        let (sink, mut stream) = socket.split();
        let writer = tokio::spawn(write_loop(sink, outbound, cancel_token.clone()));

        let dispatcher = Dispatcher {
            identity: &identity,
            registry: &registry,
            connection: &connection,
        };

        loop {
            tokio::select! {
                () = cancel_token.cancelled() => {
                    debug!(target: "room.gateway", "Session cancelled");
                    break;
                }

                frame = stream.next() => {
                    let outcome = match frame {
                        Some(Ok(message)) => dispatcher.handle_frame(message).await,
                        Some(Err(e)) => {
                            debug!(target: "room.gateway", error = %e, "Socket read failed");
                            FrameOutcome::Close
                        }
                        None => FrameOutcome::Close,
                    };
                    if outcome == FrameOutcome::Close {
                        break;
                    }
                }
            }
        }

        cancel_token.cancel();

        if let Err(e) = registry
            .disconnect(identity.id, connection.connection_id())
            .await
        {
            warn!(target: "room.gateway", error = %e, "Failed to notify registry of disconnect");
        }

        if let Err(e) = writer.await {
            warn!(target: "room.gateway", error = %e, "Writer task failed");
        }

        metrics::record_connection_closed();
        info!(target: "room.gateway", "Session ended");
    }
}

/// Routes parsed client events to the registry.
struct Dispatcher<'a> {
    identity: &'a Identity,
    registry: &'a RegistryHandle,
    connection: &'a ConnectionHandle,
}

impl Dispatcher<'_> {
    async fn handle_frame(&self, message: Message) -> FrameOutcome {
        match message {
            Message::Text(text) => match parse_client_event(&text) {
                Ok(event) => self.dispatch(event).await,
                Err(e) => {
                    self.report(&protocol_error(&e));
                    FrameOutcome::Continue
                }
            },
            Message::Binary(_) => {
                self.report(&protocol_error(&ProtocolError::UnsupportedFrame));
                FrameOutcome::Continue
            }
            Message::Close(_) => FrameOutcome::Close,
            Message::Ping(_) | Message::Pong(_) => FrameOutcome::Continue,
        }
    }

    async fn dispatch(&self, event: ClientEvent) -> FrameOutcome {
        debug!(target: "room.gateway", event = event.name(), "Client event");

        let result = match event {
            ClientEvent::JoinRoom { room_id } => self
                .registry
                .join(room_id, self.identity.clone(), self.connection.clone())
                .await
                .map(|_| ()),
            ClientEvent::LeaveRoom { room_id } => {
                self.registry.leave(room_id, self.identity.id).await
            }
            ClientEvent::SendMessage { room_id, content } => self
                .registry
                .send_message(room_id, self.identity.clone(), content)
                .await
                .map(|_| ()),
            ClientEvent::Signal {
                target_identity_id,
                payload,
            } => {
                self.registry
                    .relay_signal(self.identity.clone(), target_identity_id, payload)
                    .await
            }
            ClientEvent::CallUser {
                room_id,
                target_identity_id,
                call_type,
            } => {
                self.registry
                    .request_call(
                        self.identity.clone(),
                        room_id,
                        target_identity_id,
                        call_type,
                    )
                    .await
            }
            ClientEvent::CallResponse {
                target_identity_id,
                accepted,
            } => {
                self.registry
                    .respond_call(self.identity.clone(), target_identity_id, accepted)
                    .await
            }
        };

        match result {
            Ok(()) => FrameOutcome::Continue,
            Err(e @ (RoomError::Internal(_) | RoomError::Connectivity(_))) => {
                warn!(target: "room.gateway", error = %e, "Registry unavailable, closing session");
                FrameOutcome::Close
            }
            Err(e) => {
                self.report(&e);
                FrameOutcome::Continue
            }
        }
    }

    fn report(&self, error: &RoomError) {
        debug!(target: "room.gateway", error = %error, "Reporting error to client");
        self.connection.deliver(ServerEvent::Error {
            message: error.client_message(),
        });
    }
}

fn protocol_error(error: &ProtocolError) -> RoomError {
    RoomError::Signaling(error.to_string())
}

async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<ServerEvent>,
    cancel_token: CancellationToken,
) where
    S: futures::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        tokio::select! {
            () = cancel_token.cancelled() => break,

            event = outbound.recv() => {
                let Some(event) = event else { break };
                let text = match encode_event(&event) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(target: "room.gateway", error = %e, "Failed to encode event");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text)).await {
                    debug!(target: "room.gateway", error = %e, "Socket write failed");
                    cancel_token.cancel();
                    break;
                }
            }
        }
    }

    let _ = sink.send(Message::Close(None)).await;
}
