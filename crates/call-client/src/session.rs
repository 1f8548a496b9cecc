//! The per-endpoint call state machine.
//!
//! `CallSession` owns local media, one `PeerLink` per remote identity, and
//! the negotiation sequencing:
//!
//! ```text
//! Idle ──start_call / call-request──► Requesting ──offer|answer──► Negotiating ──ontrack──► Active
//!   ▲                                     │                                                  │
//!   └──── media denied / reject ──────────┘            end_call (any state) ──► Ended ◄──────┘
//! ```
//!
//! Any signaling failure moves the session to the absorbing `Error` state,
//! which only `end_call` leaves. `Ended` behaves like `Idle` for starting or
//! receiving the next call. A `user-left` for the remote side of the call
//! ends it as if `end_call` had been invoked.

use crate::errors::CallError;
use crate::media::{MediaConstraints, MediaDevices, MediaStream, TrackInfo, TrackKind};
use crate::peer::{
    LinkRole, PeerConnectionFactory, PeerEvent, PeerEventSender, PeerLink, SessionDescription,
};
use crate::signaling::SignalingSink;
use common::protocol::{CallType, ClientEvent, ServerEvent, SignalPayload};
use common::types::{Identity, RoomId, UserId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Signals held per identity while its call is still ringing.
pub const MAX_QUEUED_SIGNALS: usize = 256;

/// Call lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Requesting,
    Negotiating,
    Active,
    Ended,
    Error { message: String },
}

impl CallState {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            CallState::Idle => "idle",
            CallState::Requesting => "requesting",
            CallState::Negotiating => "negotiating",
            CallState::Active => "active",
            CallState::Ended => "ended",
            CallState::Error { .. } => "error",
        }
    }

    /// Whether a new call may start or be offered in this state.
    #[must_use]
    pub const fn accepts_new_call(&self) -> bool {
        matches!(self, CallState::Idle | CallState::Ended)
    }
}

/// A call request waiting for accept or reject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCall {
    pub caller: Identity,
    pub call_type: CallType,
}

/// Read-only view of a session for UIs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSnapshot {
    pub state: CallState,
    pub call_type: Option<CallType>,
    pub in_call: bool,
    pub is_muted: bool,
    pub is_camera_off: bool,
    pub is_screen_sharing: bool,
    pub incoming: Option<IncomingCall>,
    pub local_tracks: Vec<TrackInfo>,
    pub remote_streams: HashMap<UserId, Vec<TrackInfo>>,
    pub last_error: Option<String>,
}

/// Per-endpoint call state machine.
pub struct CallSession {
    state: CallState,
    call_type: Option<CallType>,
    peer_links: HashMap<UserId, PeerLink>,
    remote_streams: HashMap<UserId, MediaStream>,
    local_stream: Option<MediaStream>,
    is_muted: bool,
    is_camera_off: bool,
    is_screen_sharing: bool,
    incoming: Option<IncomingCall>,
    inbox: HashMap<UserId, VecDeque<SignalPayload>>,
    last_error: Option<String>,
    devices: Arc<dyn MediaDevices>,
    peers: Arc<dyn PeerConnectionFactory>,
    signaling: Arc<dyn SignalingSink>,
    peer_events: PeerEventSender,
}

impl CallSession {
    /// Create an idle session. Peer connections it opens post their events
    /// to `peer_events`; feed them back through `handle_peer_event`.
    #[must_use]
    pub fn new(
        devices: Arc<dyn MediaDevices>,
        peers: Arc<dyn PeerConnectionFactory>,
        signaling: Arc<dyn SignalingSink>,
        peer_events: PeerEventSender,
    ) -> Self {
        Self {
            state: CallState::Idle,
            call_type: None,
            peer_links: HashMap::new(),
            remote_streams: HashMap::new(),
            local_stream: None,
            is_muted: false,
            is_camera_off: false,
            is_screen_sharing: false,
            incoming: None,
            inbox: HashMap::new(),
            last_error: None,
            devices,
            peers,
            signaling,
            peer_events,
        }
    }

    #[must_use]
    pub fn state(&self) -> &CallState {
        &self.state
    }

    #[must_use]
    pub fn call_type(&self) -> Option<CallType> {
        self.call_type
    }

    #[must_use]
    pub fn incoming(&self) -> Option<&IncomingCall> {
        self.incoming.as_ref()
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the session holds call resources (local media or links).
    #[must_use]
    pub fn is_in_call(&self) -> bool {
        self.local_stream.is_some() || !self.peer_links.is_empty()
    }

    #[must_use]
    pub fn peer_link(&self, remote: UserId) -> Option<&PeerLink> {
        self.peer_links.get(&remote)
    }

    /// Signals waiting for the link to `from` to exist.
    #[must_use]
    pub fn queued_signals(&self, from: UserId) -> usize {
        self.inbox.get(&from).map_or(0, VecDeque::len)
    }

    #[must_use]
    pub fn snapshot(&self) -> CallSnapshot {
        CallSnapshot {
            state: self.state.clone(),
            call_type: self.call_type,
            in_call: self.is_in_call(),
            is_muted: self.is_muted,
            is_camera_off: self.is_camera_off,
            is_screen_sharing: self.is_screen_sharing,
            incoming: self.incoming.clone(),
            local_tracks: self
                .local_stream
                .as_ref()
                .map(MediaStream::info)
                .unwrap_or_default(),
            remote_streams: self
                .remote_streams
                .iter()
                .map(|(id, stream)| (*id, stream.info()))
                .collect(),
            last_error: self.last_error.clone(),
        }
    }

    /// Call `target`: capture media, open a caller link, send `call-user`
    /// and then the offer.
    ///
    /// # Errors
    ///
    /// - `CallError::InvalidState` unless the session is `Idle` or `Ended`
    /// - `CallError::MediaAccessDenied` if capture is refused (session
    ///   returns to `Idle`)
    /// - `CallError::Signaling` / `Connectivity` if the link or transport
    ///   fails (session moves to `Error`)
    #[instrument(skip_all, name = "call.session.start_call", fields(remote = %target))]
    pub async fn start_call(
        &mut self,
        room_id: RoomId,
        target: UserId,
        call_type: CallType,
    ) -> Result<(), CallError> {
        if !self.state.accepts_new_call() {
            return Err(CallError::InvalidState(format!(
                "cannot start a call while {}",
                self.state.name()
            )));
        }

        self.state = CallState::Requesting;
        self.call_type = Some(call_type);
        self.last_error = None;

        let stream = match self
            .devices
            .get_user_media(MediaConstraints::for_call(call_type))
            .await
        {
            Ok(stream) => stream,
            Err(e) => return Err(self.abort_attempt(e)),
        };
        self.local_stream = Some(stream.clone());

        if let Err(e) = self.open_link(target, LinkRole::Caller, &stream) {
            return Err(self.fail(e));
        }

        let offer = match self.create_offer(target).await {
            Ok(offer) => offer,
            Err(e) => return Err(self.fail(e)),
        };

        let sent = self
            .signaling
            .send(ClientEvent::CallUser {
                room_id,
                target_identity_id: target,
                call_type,
            })
            .and_then(|()| {
                self.signaling.send(ClientEvent::Signal {
                    target_identity_id: target,
                    payload: SignalPayload::Offer { sdp: offer.sdp },
                })
            });
        if let Err(e) = sent {
            return Err(self.fail(e));
        }

        info!(target: "call.session", call_type = ?call_type, "Call requested");
        Ok(())
    }

    /// Consume the realtime events that concern calls. Everything else is
    /// ignored.
    ///
    /// # Errors
    ///
    /// Signaling or transport failures. The session has already moved to
    /// `Error` when one is returned.
    pub async fn handle_server_event(&mut self, event: ServerEvent) -> Result<(), CallError> {
        match event {
            ServerEvent::CallRequest {
                caller_identity,
                call_type,
            } => self.on_call_request(caller_identity, call_type),
            ServerEvent::CallResponse {
                identity_id,
                accepted,
            } => {
                self.on_call_response(identity_id, accepted);
                Ok(())
            }
            ServerEvent::Signal {
                sender_identity,
                payload,
            } => self.on_signal(sender_identity.id, payload).await,
            ServerEvent::UserLeft { identity_id } => {
                self.on_user_left(identity_id);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Accept the ringing call: capture media, open a callee link, answer
    /// `true`, then replay any signals the caller sent meanwhile.
    ///
    /// # Errors
    ///
    /// - `CallError::InvalidState` if nothing is ringing
    /// - `CallError::MediaAccessDenied` if capture is refused (the caller
    ///   is told `false` and the session returns to `Idle`)
    /// - `CallError::Connectivity` if no link can be opened (the caller is
    ///   told `false` and the session moves to `Error`)
    #[instrument(skip_all, name = "call.session.accept_call")]
    pub async fn accept_call(&mut self) -> Result<(), CallError> {
        let Some(call) = self.incoming.take() else {
            return Err(CallError::InvalidState("no incoming call".to_string()));
        };
        let caller = call.caller.id;
        self.last_error = None;

        let stream = match self
            .devices
            .get_user_media(MediaConstraints::for_call(call.call_type))
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                self.inbox.remove(&caller);
                self.respond(caller, false);
                return Err(self.abort_attempt(e));
            }
        };
        self.local_stream = Some(stream.clone());

        if let Err(e) = self.open_link(caller, LinkRole::Callee, &stream) {
            self.inbox.remove(&caller);
            self.respond(caller, false);
            return Err(self.fail(e));
        }

        if let Err(e) = self.signaling.send(ClientEvent::CallResponse {
            target_identity_id: caller,
            accepted: true,
        }) {
            return Err(self.fail(e));
        }
        info!(target: "call.session", caller = %caller, "Call accepted");

        let queued = self.inbox.remove(&caller).unwrap_or_default();
        if !queued.is_empty() {
            debug!(target: "call.session", count = queued.len(), "Replaying queued signals");
        }
        for payload in queued {
            if let Err(e) = self.apply_signal(caller, payload).await {
                return Err(self.fail(e));
            }
        }

        Ok(())
    }

    /// Decline the ringing call.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` if nothing is ringing.
    pub fn reject_call(&mut self) -> Result<(), CallError> {
        let Some(call) = self.incoming.take() else {
            return Err(CallError::InvalidState("no incoming call".to_string()));
        };

        self.inbox.remove(&call.caller.id);
        self.state = CallState::Idle;
        self.call_type = None;
        self.respond(call.caller.id, false);

        info!(target: "call.session", caller = %call.caller.id, "Call rejected");
        Ok(())
    }

    /// React to a remote track or a locally gathered candidate.
    ///
    /// # Errors
    ///
    /// `CallError::Connectivity` if a candidate cannot be sent.
    pub fn handle_peer_event(&mut self, event: PeerEvent) -> Result<(), CallError> {
        match event {
            PeerEvent::Track { remote, track } => {
                if !self.peer_links.contains_key(&remote) {
                    debug!(target: "call.session", remote = %remote, "Track for unknown link ignored");
                    return Ok(());
                }

                self.remote_streams
                    .entry(remote)
                    .or_default()
                    .set_track(track);

                if self.state == CallState::Negotiating {
                    self.state = CallState::Active;
                    info!(target: "call.session", remote = %remote, "Call active");
                }
                Ok(())
            }
            PeerEvent::IceCandidate { remote, candidate } => {
                if !self.peer_links.contains_key(&remote)
                    || matches!(self.state, CallState::Error { .. })
                {
                    debug!(target: "call.session", remote = %remote, "Local candidate ignored");
                    return Ok(());
                }

                self.signaling.send(ClientEvent::Signal {
                    target_identity_id: remote,
                    payload: SignalPayload::IceCandidate { candidate },
                })
            }
        }
    }

    /// Flip the audio enabled flag. Returns the new muted state.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` without local media.
    pub fn toggle_mute(&mut self) -> Result<bool, CallError> {
        let stream = self.local_stream.as_ref().ok_or_else(no_local_media)?;
        self.is_muted = !self.is_muted;
        stream.set_enabled(TrackKind::Audio, !self.is_muted);
        Ok(self.is_muted)
    }

    /// Flip the video enabled flag. Returns the new camera-off state.
    ///
    /// # Errors
    ///
    /// `CallError::InvalidState` without local media.
    pub fn toggle_camera(&mut self) -> Result<bool, CallError> {
        let stream = self.local_stream.as_ref().ok_or_else(no_local_media)?;
        self.is_camera_off = !self.is_camera_off;
        stream.set_enabled(TrackKind::Video, !self.is_camera_off);
        Ok(self.is_camera_off)
    }

    /// Switch the outgoing video between camera and screen by replacing the
    /// track on every link. Never renegotiates. Returns the new
    /// screen-sharing state.
    ///
    /// # Errors
    ///
    /// - `CallError::InvalidState` unless `Active` with local video
    /// - `CallError::MediaAccessDenied` if capture is refused (the call
    ///   carries on unchanged)
    #[instrument(skip_all, name = "call.session.toggle_screen_share")]
    pub async fn toggle_screen_share(&mut self) -> Result<bool, CallError> {
        if self.state != CallState::Active {
            return Err(CallError::InvalidState(format!(
                "cannot share the screen while {}",
                self.state.name()
            )));
        }
        match &self.local_stream {
            None => return Err(no_local_media()),
            Some(stream) if !stream.has_video() => {
                return Err(CallError::InvalidState(
                    "screen share needs a video call".to_string(),
                ));
            }
            Some(_) => {}
        }

        let sharing = !self.is_screen_sharing;
        let acquired = if sharing {
            self.devices.get_display_media().await
        } else {
            self.devices
                .get_user_media(MediaConstraints::camera_only())
                .await
        };
        let source = match acquired {
            Ok(source) => source,
            Err(e) => {
                warn!(target: "call.session", error = %e, "Screen share source unavailable");
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        let Some(video) = source.video_track() else {
            source.stop_all();
            let e = CallError::MediaAccessDenied("capture returned no video track".to_string());
            self.last_error = Some(e.to_string());
            return Err(e);
        };
        let video_id = video.id();
        for track in source.tracks() {
            if track.id() != video_id {
                track.stop();
            }
        }
        video.set_enabled(!self.is_camera_off);

        let mut replaced = Ok(());
        for link in self.peer_links.values() {
            if let Err(e) = link
                .connection()
                .replace_track(TrackKind::Video, video.clone())
                .await
            {
                replaced = Err(e);
                break;
            }
        }
        if let Err(e) = replaced {
            video.stop();
            return Err(self.fail(e));
        }

        if let Some(stream) = self.local_stream.as_mut() {
            if let Some(previous) = stream.set_track(video) {
                previous.stop();
            }
        }
        self.is_screen_sharing = sharing;

        info!(target: "call.session", screen_sharing = sharing, "Outgoing video replaced");
        Ok(sharing)
    }

    /// Tear the call down: stop local tracks, close every link, clear remote
    /// streams and flags. A no-op from `Idle` or `Ended`.
    pub fn end_call(&mut self) {
        if self.state.accepts_new_call() {
            return;
        }

        if let Some(call) = self.incoming.take() {
            self.respond(call.caller.id, false);
        }
        if let Some(stream) = self.local_stream.take() {
            stream.stop_all();
        }
        for (_, link) in self.peer_links.drain() {
            link.close();
        }
        self.remote_streams.clear();
        self.inbox.clear();
        self.is_muted = false;
        self.is_camera_off = false;
        self.is_screen_sharing = false;
        self.call_type = None;

        info!(target: "call.session", from = self.state.name(), "Call ended");
        self.state = CallState::Ended;
    }

    fn on_call_request(&mut self, caller: Identity, call_type: CallType) -> Result<(), CallError> {
        let redial = self
            .incoming
            .as_ref()
            .is_some_and(|call| call.caller.id == caller.id);
        if redial {
            // The caller hung up and called again before we answered; its
            // earlier offer and candidates belong to a link it has closed.
            info!(target: "call.session", caller = %caller.id, "Caller redialed");
            self.inbox.remove(&caller.id);
            self.call_type = Some(call_type);
            self.incoming = Some(IncomingCall { caller, call_type });
            return Ok(());
        }

        if !self.state.accepts_new_call() {
            info!(
                target: "call.session",
                caller = %caller.id,
                state = self.state.name(),
                "Busy, rejecting incoming call"
            );
            return self.signaling.send(ClientEvent::CallResponse {
                target_identity_id: caller.id,
                accepted: false,
            });
        }

        info!(target: "call.session", caller = %caller.id, call_type = ?call_type, "Incoming call");
        self.state = CallState::Requesting;
        self.call_type = Some(call_type);
        self.incoming = Some(IncomingCall { caller, call_type });
        Ok(())
    }

    fn on_call_response(&mut self, from: UserId, accepted: bool) {
        let is_our_callee = self
            .peer_links
            .get(&from)
            .is_some_and(|link| link.role() == LinkRole::Caller);
        if !is_our_callee {
            debug!(target: "call.session", from = %from, "Call response for no outgoing call");
            return;
        }

        if accepted {
            info!(target: "call.session", from = %from, "Remote accepted");
        } else {
            info!(target: "call.session", from = %from, "Remote rejected");
            self.end_call();
        }
    }

    /// The remote side left the room or lost its connection.
    fn on_user_left(&mut self, identity_id: UserId) {
        let ringing = self
            .incoming
            .as_ref()
            .is_some_and(|call| call.caller.id == identity_id);
        if !ringing && !self.peer_links.contains_key(&identity_id) {
            return;
        }

        if ringing {
            self.incoming = None;
        }
        info!(target: "call.session", remote = %identity_id, "Remote left, ending call");
        self.end_call();
    }

    async fn on_signal(&mut self, from: UserId, payload: SignalPayload) -> Result<(), CallError> {
        if matches!(self.state, CallState::Error { .. }) {
            debug!(target: "call.session", from = %from, "Signal ignored in error state");
            return Ok(());
        }

        if !self.peer_links.contains_key(&from) {
            let ringing = self
                .incoming
                .as_ref()
                .is_some_and(|call| call.caller.id == from);
            if ringing {
                self.enqueue(from, payload);
            } else {
                debug!(
                    target: "call.session",
                    from = %from,
                    kind = payload.kind(),
                    "Signal from identity with no call dropped"
                );
            }
            return Ok(());
        }

        if let Err(e) = self.apply_signal(from, payload).await {
            return Err(self.fail(e));
        }
        Ok(())
    }

    fn enqueue(&mut self, from: UserId, payload: SignalPayload) {
        let queue = self.inbox.entry(from).or_default();
        if queue.len() >= MAX_QUEUED_SIGNALS {
            warn!(
                target: "call.session",
                from = %from,
                kind = payload.kind(),
                "Signal inbox full, dropping"
            );
            return;
        }
        queue.push_back(payload);
    }

    async fn apply_signal(&mut self, from: UserId, payload: SignalPayload) -> Result<(), CallError> {
        let link = self
            .peer_links
            .get_mut(&from)
            .ok_or_else(|| CallError::Signaling(format!("no link for {from}")))?;

        match payload {
            SignalPayload::Offer { sdp } => {
                if link.role() != LinkRole::Callee {
                    return Err(CallError::Signaling("unexpected offer".to_string()));
                }
                link.apply_remote_description(SessionDescription::offer(sdp))
                    .await?;
                let answer = link.connection().create_answer().await?;
                link.connection()
                    .set_local_description(answer.clone())
                    .await?;
                self.signaling.send(ClientEvent::Signal {
                    target_identity_id: from,
                    payload: SignalPayload::Answer { sdp: answer.sdp },
                })?;
                self.enter_negotiating(from);
            }
            SignalPayload::Answer { sdp } => {
                if link.role() != LinkRole::Caller {
                    return Err(CallError::Signaling("unexpected answer".to_string()));
                }
                link.apply_remote_description(SessionDescription::answer(sdp))
                    .await?;
                self.enter_negotiating(from);
            }
            SignalPayload::IceCandidate { candidate } => {
                link.add_remote_candidate(candidate).await?;
            }
        }
        Ok(())
    }

    fn enter_negotiating(&mut self, remote: UserId) {
        if self.state == CallState::Requesting {
            self.state = CallState::Negotiating;
            debug!(target: "call.session", remote = %remote, "Negotiating");
        }
    }

    async fn create_offer(&self, remote: UserId) -> Result<SessionDescription, CallError> {
        let link = self
            .peer_links
            .get(&remote)
            .ok_or_else(|| CallError::Signaling(format!("no link for {remote}")))?;
        let offer = link.connection().create_offer().await?;
        link.connection()
            .set_local_description(offer.clone())
            .await?;
        Ok(offer)
    }

    fn open_link(
        &mut self,
        remote: UserId,
        role: LinkRole,
        stream: &MediaStream,
    ) -> Result<(), CallError> {
        let connection = self.peers.create(remote, self.peer_events.clone())?;
        for track in stream.tracks() {
            if let Err(e) = connection.add_track(track.clone()) {
                connection.close();
                return Err(e);
            }
        }
        self.peer_links
            .insert(remote, PeerLink::new(remote, role, connection));
        debug!(target: "call.session", remote = %remote, role = ?role, "Peer link opened");
        Ok(())
    }

    fn respond(&self, target: UserId, accepted: bool) {
        if let Err(e) = self.signaling.send(ClientEvent::CallResponse {
            target_identity_id: target,
            accepted,
        }) {
            warn!(target: "call.session", error = %e, "Failed to send call response");
        }
    }

    /// Media could not be acquired: drop the attempt and go back to `Idle`.
    fn abort_attempt(&mut self, error: CallError) -> CallError {
        warn!(target: "call.session", error = %error, "Call attempt aborted");
        if let Some(stream) = self.local_stream.take() {
            stream.stop_all();
        }
        self.call_type = None;
        self.last_error = Some(error.to_string());
        self.state = CallState::Idle;
        error
    }

    fn fail(&mut self, error: CallError) -> CallError {
        warn!(target: "call.session", error = %error, from = self.state.name(), "Call failed");
        let message = error.to_string();
        self.last_error = Some(message.clone());
        self.state = CallState::Error { message };
        error
    }
}

fn no_local_media() -> CallError {
    CallError::InvalidState("no local media".to_string())
}
