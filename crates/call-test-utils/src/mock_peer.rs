//! Mock peer connections joined by an in-memory "wire".
//!
//! Each `MockPeerConnection` publishes its outgoing tracks into a shared
//! `MockNetwork`, keyed by `(sender, receiver)`. Once a connection has both
//! descriptions it raises `PeerEvent::Track` for every sender slot of the
//! other side. The remote tracks it hands out read the other side's slot
//! on every call, so a `replace_track` there changes what this side sees.

use call_client::errors::CallError;
use call_client::media::{MediaTrack, SharedTrack, TrackKind};
use call_client::peer::{
    PeerConnection, PeerConnectionFactory, PeerEvent, PeerEventSender, SdpType,
    SessionDescription,
};
use common::protocol::IceCandidate;
use common::types::UserId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Slots = HashMap<TrackKind, SharedTrack>;

/// Outgoing tracks of every mock connection.
#[derive(Debug, Clone, Default)]
pub struct MockNetwork {
    senders: Arc<Mutex<HashMap<(UserId, UserId), Slots>>>,
}

impl MockNetwork {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The track `from` currently sends to `to`.
    #[must_use]
    pub fn sending(&self, from: UserId, to: UserId, kind: TrackKind) -> Option<SharedTrack> {
        self.senders
            .lock()
            .unwrap()
            .get(&(from, to))
            .and_then(|slots| slots.get(&kind))
            .cloned()
    }

    fn kinds(&self, from: UserId, to: UserId) -> Vec<TrackKind> {
        let mut kinds: Vec<_> = self
            .senders
            .lock()
            .unwrap()
            .get(&(from, to))
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default();
        kinds.sort_by_key(|kind| matches!(kind, TrackKind::Video));
        kinds
    }

    fn publish(&self, from: UserId, to: UserId, track: SharedTrack) {
        self.senders
            .lock()
            .unwrap()
            .entry((from, to))
            .or_default()
            .insert(track.kind(), track);
    }

    fn withdraw(&self, from: UserId, to: UserId) {
        self.senders.lock().unwrap().remove(&(from, to));
    }
}

/// What `receiver` gets from `sender`: whatever `sender` sends right now.
#[derive(Debug)]
pub struct MockRemoteTrack {
    sender: UserId,
    receiver: UserId,
    kind: TrackKind,
    network: MockNetwork,
}

impl MockRemoteTrack {
    fn current(&self) -> Option<SharedTrack> {
        self.network.sending(self.sender, self.receiver, self.kind)
    }
}

impl MediaTrack for MockRemoteTrack {
    fn id(&self) -> String {
        self.current().map(|t| t.id()).unwrap_or_default()
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn set_enabled(&self, _enabled: bool) {}

    fn is_enabled(&self) -> bool {
        self.current().is_some_and(|t| t.is_enabled())
    }

    fn stop(&self) {}
}

/// One recorded peer connection operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerCall {
    pub local: UserId,
    pub remote: UserId,
    pub op: String,
}

#[derive(Debug, Default)]
struct ConnectionState {
    local_description: Option<SdpType>,
    remote_description: Option<SdpType>,
    tracks_raised: bool,
    candidates_gathered: usize,
    closed: bool,
}

/// Mock peer connection from `local` to `remote`.
pub struct MockPeerConnection {
    local: UserId,
    remote: UserId,
    network: MockNetwork,
    events: PeerEventSender,
    calls: Arc<Mutex<Vec<PeerCall>>>,
    fail_candidates: bool,
    state: Mutex<ConnectionState>,
}

impl MockPeerConnection {
    fn record(&self, op: impl Into<String>) {
        self.calls.lock().unwrap().push(PeerCall {
            local: self.local,
            remote: self.remote,
            op: op.into(),
        });
    }

    fn sdp(&self, kind: &str) -> String {
        format!("v=0 {kind} {}->{}", self.local, self.remote)
    }

    fn gather_candidate(&self) {
        let n = {
            let mut state = self.state.lock().unwrap();
            state.candidates_gathered += 1;
            state.candidates_gathered
        };
        let _ = self.events.send(PeerEvent::IceCandidate {
            remote: self.remote,
            candidate: IceCandidate {
                candidate: format!("candidate:{n} 1 udp {}", self.local),
                sdp_mid: Some("0".to_string()),
                sdp_m_line_index: Some(0),
            },
        });
    }

    fn raise_tracks_when_connected(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.tracks_raised
                || state.closed
                || state.local_description.is_none()
                || state.remote_description.is_none()
            {
                return;
            }
            state.tracks_raised = true;
        }

        for kind in self.network.kinds(self.remote, self.local) {
            let track: SharedTrack = Arc::new(MockRemoteTrack {
                sender: self.remote,
                receiver: self.local,
                kind,
                network: self.network.clone(),
            });
            let _ = self.events.send(PeerEvent::Track {
                remote: self.remote,
                track,
            });
        }
    }
}

#[async_trait::async_trait]
impl PeerConnection for MockPeerConnection {
    async fn create_offer(&self) -> Result<SessionDescription, CallError> {
        self.record("create_offer");
        Ok(SessionDescription::offer(self.sdp("offer")))
    }

    async fn create_answer(&self) -> Result<SessionDescription, CallError> {
        self.record("create_answer");
        if self.state.lock().unwrap().remote_description != Some(SdpType::Offer) {
            return Err(CallError::Signaling(
                "answer requested without a remote offer".to_string(),
            ));
        }
        Ok(SessionDescription::answer(self.sdp("answer")))
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), CallError> {
        self.record(format!("set_local:{:?}", description.kind));
        self.state.lock().unwrap().local_description = Some(description.kind);
        self.gather_candidate();
        self.raise_tracks_when_connected();
        Ok(())
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), CallError> {
        self.record(format!("set_remote:{:?}", description.kind));
        self.state.lock().unwrap().remote_description = Some(description.kind);
        self.raise_tracks_when_connected();
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), CallError> {
        if self.state.lock().unwrap().remote_description.is_none() {
            return Err(CallError::Signaling(
                "candidate applied before remote description".to_string(),
            ));
        }
        if self.fail_candidates {
            return Err(CallError::Signaling("malformed candidate".to_string()));
        }
        self.record(format!("add_ice:{}", candidate.candidate));
        Ok(())
    }

    async fn replace_track(&self, kind: TrackKind, track: SharedTrack) -> Result<(), CallError> {
        self.record(format!("replace_track:{kind:?}:{}", track.id()));
        self.network.publish(self.local, self.remote, track);
        Ok(())
    }

    fn add_track(&self, track: SharedTrack) -> Result<(), CallError> {
        self.record(format!("add_track:{:?}", track.kind()));
        self.network.publish(self.local, self.remote, track);
        Ok(())
    }

    fn close(&self) {
        self.record("close");
        self.state.lock().unwrap().closed = true;
        self.network.withdraw(self.local, self.remote);
    }
}

/// Factory of `MockPeerConnection`s for one endpoint.
#[derive(Debug)]
pub struct MockPeerFactory {
    local: UserId,
    network: MockNetwork,
    calls: Arc<Mutex<Vec<PeerCall>>>,
    created: AtomicUsize,
    refuse: bool,
    fail_candidates: bool,
}

impl MockPeerFactory {
    #[must_use]
    pub fn new(local: UserId, network: MockNetwork) -> Self {
        Self {
            local,
            network,
            calls: Arc::new(Mutex::new(Vec::new())),
            created: AtomicUsize::new(0),
            refuse: false,
            fail_candidates: false,
        }
    }

    /// A factory whose media engine cannot create connections.
    #[must_use]
    pub fn refusing(local: UserId, network: MockNetwork) -> Self {
        Self {
            refuse: true,
            ..Self::new(local, network)
        }
    }

    /// Connections that reject every remote candidate.
    #[must_use]
    pub fn with_failing_candidates(mut self) -> Self {
        self.fail_candidates = true;
        self
    }

    #[must_use]
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Every operation performed on this factory's connections.
    #[must_use]
    pub fn calls(&self) -> Vec<PeerCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Operation names on the connection to `remote`, in order.
    #[must_use]
    pub fn ops_with(&self, remote: UserId) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.remote == remote)
            .map(|call| call.op.clone())
            .collect()
    }

    /// How many operations start with `prefix`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.op.starts_with(prefix))
            .count()
    }
}

impl PeerConnectionFactory for MockPeerFactory {
    fn create(
        &self,
        remote: UserId,
        events: PeerEventSender,
    ) -> Result<Box<dyn PeerConnection>, CallError> {
        if self.refuse {
            return Err(CallError::Connectivity(
                "peer connection unavailable".to_string(),
            ));
        }
        self.created.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MockPeerConnection {
            local: self.local,
            remote,
            network: self.network.clone(),
            events,
            calls: self.calls.clone(),
            fail_candidates: self.fail_candidates,
            state: Mutex::new(ConnectionState::default()),
        }))
    }
}
