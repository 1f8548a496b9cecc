//! Wired call endpoints for end-to-end call flow tests.

use crate::mock_media::MockDevices;
use crate::mock_peer::{MockNetwork, MockPeerFactory};
use crate::mock_signaling::LoopbackRouter;
use call_client::{CallSessionActor, CallSessionHandle, CallSnapshot};
use common::types::{Identity, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long `wait_for` polls before failing the test.
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Shared network and router for a group of endpoints.
#[derive(Debug)]
pub struct CallHarness {
    pub network: MockNetwork,
    pub router: Arc<LoopbackRouter>,
    cancel_token: CancellationToken,
}

impl Default for CallHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl CallHarness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            network: MockNetwork::new(),
            router: LoopbackRouter::new(),
            cancel_token: CancellationToken::new(),
        }
    }

    /// An endpoint whose devices grant everything.
    #[must_use]
    pub fn endpoint(&self, name: &str) -> TestEndpoint {
        self.endpoint_with(name, MockDevices::new(name))
    }

    /// An endpoint with custom devices.
    #[must_use]
    pub fn endpoint_with(&self, name: &str, devices: MockDevices) -> TestEndpoint {
        let identity = Identity::new(UserId::new(), name);
        let devices = Arc::new(devices);
        let peers = Arc::new(MockPeerFactory::new(identity.id, self.network.clone()));

        let (handle, task) = CallSessionActor::spawn(
            devices.clone(),
            peers.clone(),
            Arc::new(self.router.sink_for(identity.clone())),
            self.cancel_token.child_token(),
        );
        self.router.register(identity.id, handle.server_event_sender());

        TestEndpoint {
            identity,
            handle,
            devices,
            peers,
            task,
        }
    }
}

impl Drop for CallHarness {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// One running call endpoint.
pub struct TestEndpoint {
    pub identity: Identity,
    pub handle: CallSessionHandle,
    pub devices: Arc<MockDevices>,
    pub peers: Arc<MockPeerFactory>,
    pub task: JoinHandle<()>,
}

impl TestEndpoint {
    #[must_use]
    pub fn id(&self) -> UserId {
        self.identity.id
    }

    pub async fn snapshot(&self) -> CallSnapshot {
        self.handle.snapshot().await.expect("call actor is gone")
    }

    /// Poll the snapshot until `predicate` holds.
    ///
    /// # Panics
    ///
    /// If it does not hold within `WAIT_TIMEOUT`.
    pub async fn wait_for(&self, predicate: impl Fn(&CallSnapshot) -> bool) -> CallSnapshot {
        let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
        loop {
            let snapshot = self.snapshot().await;
            if predicate(&snapshot) {
                return snapshot;
            }
            if tokio::time::Instant::now() >= deadline {
                panic!(
                    "{}: condition not met, last snapshot: {snapshot:?}",
                    self.identity.display_name
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Let the actor drain whatever is already queued.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
            let _ = self.handle.snapshot().await;
        }
    }
}
