//! Outbound realtime events.

use crate::errors::CallError;
use common::protocol::ClientEvent;
use tokio::sync::mpsc;

/// Where the state machine sends `call-user`, `call-response` and `signal`
/// events. Sending never blocks.
pub trait SignalingSink: Send + Sync {
    /// # Errors
    ///
    /// `CallError::Connectivity` if the transport is gone or backed up.
    fn send(&self, event: ClientEvent) -> Result<(), CallError>;
}

/// A bounded channel feeding the transport's writer.
impl SignalingSink for mpsc::Sender<ClientEvent> {
    fn send(&self, event: ClientEvent) -> Result<(), CallError> {
        self.try_send(event).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                CallError::Connectivity("signaling queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                CallError::Connectivity("signaling channel closed".to_string())
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use common::types::UserId;

    fn event() -> ClientEvent {
        ClientEvent::CallResponse {
            target_identity_id: UserId::new(),
            accepted: false,
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::channel(1);
        let sent = event();

        SignalingSink::send(&tx, sent.clone()).unwrap();

        assert_eq!(rx.recv().await.unwrap(), sent);
    }

    #[test]
    fn test_channel_sink_full_and_closed() {
        let (tx, rx) = mpsc::channel(1);
        SignalingSink::send(&tx, event()).unwrap();

        assert!(matches!(
            SignalingSink::send(&tx, event()),
            Err(CallError::Connectivity(_))
        ));

        drop(rx);
        assert!(matches!(
            SignalingSink::send(&tx, event()),
            Err(CallError::Connectivity(_))
        ));
    }
}
