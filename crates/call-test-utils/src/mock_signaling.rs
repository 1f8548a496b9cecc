//! Signaling sinks for tests.
//!
//! `RecordingSink` just keeps what the state machine sends. The
//! `LoopbackRouter` plays the part of the server's call coordinator for
//! in-process endpoints: it rewrites each outbound event into the event
//! the target would receive and delivers it to that endpoint's actor.
//! Events for unknown targets are dropped silently, as the server does.

use call_client::errors::CallError;
use call_client::signaling::SignalingSink;
use common::protocol::{ClientEvent, ServerEvent};
use common::types::{Identity, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Records every event; optionally refuses them all.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ClientEvent>>,
    disconnected: bool,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose transport is gone.
    #[must_use]
    pub fn disconnected() -> Self {
        Self {
            disconnected: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn events(&self) -> Vec<ClientEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Drain recorded events.
    pub fn take(&self) -> Vec<ClientEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

impl SignalingSink for RecordingSink {
    fn send(&self, event: ClientEvent) -> Result<(), CallError> {
        if self.disconnected {
            return Err(CallError::Connectivity("socket closed".to_string()));
        }
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// One event as delivered by the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub to: UserId,
    pub event: ServerEvent,
}

/// In-process stand-in for the server's signaling relay.
#[derive(Debug, Default)]
pub struct LoopbackRouter {
    endpoints: Mutex<HashMap<UserId, mpsc::Sender<ServerEvent>>>,
    deliveries: Mutex<Vec<Delivery>>,
}

impl LoopbackRouter {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make `identity` reachable through `events`.
    pub fn register(&self, identity: UserId, events: mpsc::Sender<ServerEvent>) {
        self.endpoints.lock().unwrap().insert(identity, events);
    }

    /// Make `identity` unreachable.
    pub fn unregister(&self, identity: UserId) {
        self.endpoints.lock().unwrap().remove(&identity);
    }

    /// A sink that sends as `identity`.
    #[must_use]
    pub fn sink_for(self: &Arc<Self>, identity: Identity) -> LoopbackSignaling {
        LoopbackSignaling {
            identity,
            router: self.clone(),
        }
    }

    /// Everything delivered to `to`, in order.
    #[must_use]
    pub fn delivered_to(&self, to: UserId) -> Vec<ServerEvent> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .filter(|d| d.to == to)
            .map(|d| d.event.clone())
            .collect()
    }

    /// Signal payload kinds delivered to `to`, in order.
    #[must_use]
    pub fn signals_to(&self, to: UserId) -> Vec<&'static str> {
        self.delivered_to(to)
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Signal { payload, .. } => Some(payload.kind()),
                _ => None,
            })
            .collect()
    }

    fn route(&self, from: &Identity, event: ClientEvent) {
        let (to, delivered) = match event {
            ClientEvent::Signal {
                target_identity_id,
                payload,
            } => (
                target_identity_id,
                ServerEvent::Signal {
                    sender_identity: from.clone(),
                    payload,
                },
            ),
            ClientEvent::CallUser {
                target_identity_id,
                call_type,
                ..
            } => (
                target_identity_id,
                ServerEvent::CallRequest {
                    caller_identity: from.clone(),
                    call_type,
                },
            ),
            ClientEvent::CallResponse {
                target_identity_id,
                accepted,
            } => (
                target_identity_id,
                ServerEvent::CallResponse {
                    identity_id: from.id,
                    accepted,
                },
            ),
            ClientEvent::JoinRoom { .. }
            | ClientEvent::LeaveRoom { .. }
            | ClientEvent::SendMessage { .. } => return,
        };

        let Some(endpoint) = self.endpoints.lock().unwrap().get(&to).cloned() else {
            return;
        };
        if endpoint.try_send(delivered.clone()).is_ok() {
            self.deliveries.lock().unwrap().push(Delivery {
                to,
                event: delivered,
            });
        }
    }
}

/// `SignalingSink` that routes through a `LoopbackRouter`.
#[derive(Debug, Clone)]
pub struct LoopbackSignaling {
    identity: Identity,
    router: Arc<LoopbackRouter>,
}

impl SignalingSink for LoopbackSignaling {
    fn send(&self, event: ClientEvent) -> Result<(), CallError> {
        self.router.route(&self.identity, event);
        Ok(())
    }
}
