//! `ConnectionHandle` - the registry's view of one realtime connection.
//!
//! The registry never writes to sockets. It pushes `ServerEvent`s into the
//! connection's bounded outbound queue and the gateway's writer task drains
//! it. Delivery never blocks the registry: a connection whose queue is full
//! is cancelled and cleaned up through the normal disconnect path.

use crate::observability::metrics;

use common::protocol::ServerEvent;
use common::types::{ConnectionId, UserId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Handle to one authenticated realtime connection.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    identity_id: UserId,
    sender: mpsc::Sender<ServerEvent>,
    cancel_token: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle together with the receiving end of its outbound queue.
    #[must_use]
    pub fn channel(
        identity_id: UserId,
        buffer: usize,
        cancel_token: CancellationToken,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        let handle = Self {
            connection_id: ConnectionId::new(),
            identity_id,
            sender,
            cancel_token,
        };
        (handle, receiver)
    }

    /// Get the connection ID.
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Get the identity this connection authenticated as.
    #[must_use]
    pub fn identity_id(&self) -> UserId {
        self.identity_id
    }

    /// Queue an event for delivery.
    ///
    /// Returns `false` if the event was not queued. A full queue evicts the
    /// connection; a closed queue means the connection is already gone.
    pub fn deliver(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    target: "room.connection",
                    connection_id = %self.connection_id,
                    identity_id = %self.identity_id,
                    event = event.name(),
                    "Outbound queue full, evicting connection"
                );
                metrics::record_connection_evicted();
                self.cancel_token.cancel();
                false
            }
            Err(TrySendError::Closed(event)) => {
                debug!(
                    target: "room.connection",
                    connection_id = %self.connection_id,
                    event = event.name(),
                    "Connection closed, event discarded"
                );
                false
            }
        }
    }

    /// Cancel the connection. The gateway closes the socket and runs
    /// disconnect cleanup.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the connection has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn error_event(message: &str) -> ServerEvent {
        ServerEvent::Error {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn test_deliver_queues_in_order() {
        let (handle, mut rx) = ConnectionHandle::channel(UserId::new(), 8, CancellationToken::new());

        assert!(handle.deliver(error_event("one")));
        assert!(handle.deliver(error_event("two")));

        assert_eq!(rx.recv().await, Some(error_event("one")));
        assert_eq!(rx.recv().await, Some(error_event("two")));
    }

    #[tokio::test]
    async fn test_full_queue_evicts_connection() {
        let token = CancellationToken::new();
        let (handle, _rx) = ConnectionHandle::channel(UserId::new(), 1, token.clone());

        assert!(handle.deliver(error_event("fits")));
        assert!(!handle.is_cancelled());

        assert!(!handle.deliver(error_event("overflow")));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_closed_queue_does_not_cancel() {
        let (handle, rx) = ConnectionHandle::channel(UserId::new(), 4, CancellationToken::new());
        drop(rx);

        assert!(!handle.deliver(error_event("gone")));
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_clones_share_identity() {
        let user = UserId::new();
        let (handle, _rx) = ConnectionHandle::channel(user, 4, CancellationToken::new());
        let clone = handle.clone();

        assert_eq!(clone.connection_id(), handle.connection_id());
        assert_eq!(clone.identity_id(), user);
    }
}
