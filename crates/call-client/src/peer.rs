//! Peer connection capability and the per-remote `PeerLink`.
//!
//! The state machine never sees a concrete WebRTC stack. It drives a
//! `PeerConnection` through offer/answer and candidate exchange, and learns
//! about remote tracks and local candidates as `PeerEvent`s in its inbox.

use crate::errors::CallError;
use crate::media::{SharedTrack, TrackKind};
use common::protocol::IceCandidate;
use common::types::UserId;
use std::fmt;
use tokio::sync::mpsc;
use tracing::debug;

/// Offer or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpType {
    Offer,
    Answer,
}

/// A session description produced or consumed by a peer connection.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    #[must_use]
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    #[must_use]
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// SDP bodies stay out of logs.
impl fmt::Debug for SessionDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDescription")
            .field("kind", &self.kind)
            .field("sdp_len", &self.sdp.len())
            .finish()
    }
}

/// Events a peer connection raises on its own.
#[derive(Debug, Clone)]
pub enum PeerEvent {
    /// A remote track arrived (`ontrack`).
    Track { remote: UserId, track: SharedTrack },
    /// A local candidate was gathered (`onicecandidate`).
    IceCandidate {
        remote: UserId,
        candidate: IceCandidate,
    },
}

/// Where peer connections post their events.
pub type PeerEventSender = mpsc::UnboundedSender<PeerEvent>;

/// Peer connection capability.
#[async_trait::async_trait]
pub trait PeerConnection: Send + Sync {
    async fn create_offer(&self) -> Result<SessionDescription, CallError>;
    async fn create_answer(&self) -> Result<SessionDescription, CallError>;
    async fn set_local_description(&self, description: SessionDescription)
        -> Result<(), CallError>;
    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), CallError>;
    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<(), CallError>;
    /// Swap the outgoing track of `kind` in place, without renegotiating.
    async fn replace_track(&self, kind: TrackKind, track: SharedTrack) -> Result<(), CallError>;
    fn add_track(&self, track: SharedTrack) -> Result<(), CallError>;
    fn close(&self);
}

/// Creates one peer connection per remote identity.
pub trait PeerConnectionFactory: Send + Sync {
    /// # Errors
    ///
    /// `CallError::Connectivity` if the media engine cannot create a
    /// connection.
    fn create(
        &self,
        remote: UserId,
        events: PeerEventSender,
    ) -> Result<Box<dyn PeerConnection>, CallError>;
}

/// Which side of the offer/answer exchange this endpoint plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Caller,
    Callee,
}

/// One remote identity's peer connection and its candidate queue.
///
/// Remote candidates that arrive before the remote description is set are
/// held in arrival order and applied right after it.
pub struct PeerLink {
    remote: UserId,
    role: LinkRole,
    connection: Box<dyn PeerConnection>,
    remote_description_set: bool,
    pending_candidates: Vec<IceCandidate>,
}

impl PeerLink {
    #[must_use]
    pub fn new(remote: UserId, role: LinkRole, connection: Box<dyn PeerConnection>) -> Self {
        Self {
            remote,
            role,
            connection,
            remote_description_set: false,
            pending_candidates: Vec::new(),
        }
    }

    #[must_use]
    pub fn remote(&self) -> UserId {
        self.remote
    }

    #[must_use]
    pub fn role(&self) -> LinkRole {
        self.role
    }

    #[must_use]
    pub fn connection(&self) -> &dyn PeerConnection {
        self.connection.as_ref()
    }

    #[must_use]
    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    #[must_use]
    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    /// Set the remote description, then flush queued candidates in arrival
    /// order.
    ///
    /// # Errors
    ///
    /// Whatever the connection reports for the description or a flushed
    /// candidate.
    pub async fn apply_remote_description(
        &mut self,
        description: SessionDescription,
    ) -> Result<(), CallError> {
        self.connection.set_remote_description(description).await?;
        self.remote_description_set = true;

        let pending = std::mem::take(&mut self.pending_candidates);
        if !pending.is_empty() {
            debug!(
                target: "call.peer",
                remote = %self.remote,
                count = pending.len(),
                "Flushing queued ICE candidates"
            );
        }
        for candidate in pending {
            self.connection.add_ice_candidate(candidate).await?;
        }
        Ok(())
    }

    /// Apply a remote candidate, or queue it until the remote description
    /// is set.
    ///
    /// # Errors
    ///
    /// Whatever the connection reports for the candidate.
    pub async fn add_remote_candidate(&mut self, candidate: IceCandidate) -> Result<(), CallError> {
        if self.remote_description_set {
            self.connection.add_ice_candidate(candidate).await
        } else {
            self.pending_candidates.push(candidate);
            Ok(())
        }
    }

    /// Close the connection. Fire-and-forget.
    pub fn close(&self) {
        self.connection.close();
    }
}

impl fmt::Debug for PeerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerLink")
            .field("remote", &self.remote)
            .field("role", &self.role)
            .field("remote_description_set", &self.remote_description_set)
            .field("pending_candidates", &self.pending_candidates.len())
            .finish_non_exhaustive()
    }
}
