//! Call flow tests between in-process endpoints.
//!
//! Endpoints run real `CallSessionActor`s wired through the loopback
//! router, with mock media and peer connections.

// Test code is allowed to use expect/unwrap for assertions
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

use anyhow::Result;
use call_client::errors::CallError;
use call_client::media::{MediaTrack, TrackInfo, TrackKind};
use call_client::peer::PeerEvent;
use call_client::{CallSession, CallSnapshot, CallState};
use call_test_utils::{
    CallHarness, MockDevices, MockNetwork, MockPeerFactory, RecordingSink, TestEndpoint,
};
use common::protocol::{CallType, ClientEvent, IceCandidate, ServerEvent, SignalPayload};
use common::types::{Identity, RoomId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn room() -> RoomId {
    RoomId::from("abcd1234")
}

fn is_active(snapshot: &CallSnapshot) -> bool {
    snapshot.state == CallState::Active
}

fn video_id(tracks: &[TrackInfo]) -> Option<String> {
    tracks
        .iter()
        .find(|t| t.kind == TrackKind::Video)
        .map(|t| t.id.clone())
}

/// Poll `condition` until it holds or two seconds pass.
async fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// `caller` calls `callee`, which accepts; both reach `Active`.
async fn connect(
    caller: &TestEndpoint,
    callee: &TestEndpoint,
    call_type: CallType,
) -> Result<()> {
    caller
        .handle
        .start_call(room(), callee.id(), call_type)
        .await?;
    callee.wait_for(|s| s.incoming.is_some()).await;
    callee.handle.accept_call().await?;
    caller.wait_for(is_active).await;
    callee.wait_for(is_active).await;
    Ok(())
}

// ============================================================================
// Caller/callee happy path
// ============================================================================

#[tokio::test]
async fn test_video_call_reaches_active_on_both_sides() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Video)
        .await?;

    let ringing = bob.wait_for(|s| s.incoming.is_some()).await;
    let incoming = ringing.incoming.clone().unwrap();
    assert_eq!(incoming.caller, alice.identity);
    assert_eq!(incoming.call_type, CallType::Video);
    assert_eq!(ringing.state, CallState::Requesting);
    assert!(!ringing.in_call);

    bob.handle.accept_call().await?;

    let alice_view = alice.wait_for(is_active).await;
    let bob_view = bob.wait_for(is_active).await;

    assert!(alice_view.in_call);
    assert_eq!(alice_view.call_type, Some(CallType::Video));
    let from_bob = &alice_view.remote_streams[&bob.id()];
    let mut ids: Vec<_> = from_bob.iter().map(|t| t.id.clone()).collect();
    ids.sort();
    assert_eq!(ids, vec!["bob-cam-1", "bob-mic-1"]);
    assert_eq!(
        video_id(&bob_view.remote_streams[&alice.id()]).as_deref(),
        Some("alice-cam-1")
    );
    Ok(())
}

#[tokio::test]
async fn test_negotiation_order_and_candidate_exchange() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    connect(&alice, &bob, CallType::Audio).await?;
    assert!(
        eventually(|| alice.peers.count("add_ice") == 1 && bob.peers.count("add_ice") == 1).await
    );

    let alice_ops = alice.peers.ops_with(bob.id());
    assert_eq!(
        &alice_ops[..4],
        &["add_track:Audio", "create_offer", "set_local:Offer", "set_remote:Answer"]
    );

    let bob_ops = bob.peers.ops_with(alice.id());
    assert_eq!(
        &bob_ops[..4],
        &["add_track:Audio", "set_remote:Offer", "create_answer", "set_local:Answer"]
    );
    assert!(bob_ops[4].starts_with("add_ice:"));

    // call-user precedes the offer on the wire
    let to_bob = harness.router.delivered_to(bob.id());
    assert!(matches!(to_bob[0], ServerEvent::CallRequest { .. }));
    assert_eq!(
        harness.router.signals_to(bob.id()),
        vec!["offer", "ice-candidate"]
    );
    assert_eq!(
        harness.router.signals_to(alice.id()),
        vec!["answer", "ice-candidate"]
    );
    Ok(())
}

// ============================================================================
// Screen share without renegotiation
// ============================================================================

#[tokio::test]
async fn test_screen_share_replaces_track_without_new_signaling() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    connect(&alice, &bob, CallType::Video).await?;
    assert!(eventually(|| harness.router.signals_to(alice.id()).len() == 2).await);

    let signals_before = harness.router.signals_to(alice.id());
    let offers = alice.peers.count("create_offer") + bob.peers.count("create_offer");
    let answers = alice.peers.count("create_answer") + bob.peers.count("create_answer");

    assert!(bob.handle.toggle_screen_share().await?);

    let alice_view = alice.snapshot().await;
    assert_eq!(
        video_id(&alice_view.remote_streams[&bob.id()]).as_deref(),
        Some("bob-screen-1")
    );
    let bob_view = bob.snapshot().await;
    assert!(bob_view.is_screen_sharing);
    assert_eq!(video_id(&bob_view.local_tracks).as_deref(), Some("bob-screen-1"));
    assert!(bob.devices.track("bob-cam-1").unwrap().is_stopped());

    bob.settle().await;
    alice.settle().await;
    assert_eq!(harness.router.signals_to(alice.id()), signals_before);
    assert_eq!(
        alice.peers.count("create_offer") + bob.peers.count("create_offer"),
        offers
    );
    assert_eq!(
        alice.peers.count("create_answer") + bob.peers.count("create_answer"),
        answers
    );
    assert_eq!(alice.snapshot().await.state, CallState::Active);

    // and back to the camera
    assert!(!bob.handle.toggle_screen_share().await?);
    let alice_view = alice.snapshot().await;
    assert_eq!(
        video_id(&alice_view.remote_streams[&bob.id()]).as_deref(),
        Some("bob-cam-2")
    );
    assert!(bob.devices.track("bob-screen-1").unwrap().is_stopped());
    assert!(!bob.snapshot().await.is_screen_sharing);
    Ok(())
}

#[tokio::test]
async fn test_screen_share_denied_keeps_call() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint_with("bob", MockDevices::denying_display("bob"));
    connect(&alice, &bob, CallType::Video).await?;

    let result = bob.handle.toggle_screen_share().await;

    assert!(matches!(result, Err(CallError::MediaAccessDenied(_))));
    let view = bob.snapshot().await;
    assert_eq!(view.state, CallState::Active);
    assert!(!view.is_screen_sharing);
    assert!(view.last_error.unwrap().contains("screen capture cancelled"));
    assert_eq!(video_id(&view.local_tracks).as_deref(), Some("bob-cam-1"));
    Ok(())
}

#[tokio::test]
async fn test_screen_share_needs_video_call() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    connect(&alice, &bob, CallType::Audio).await?;

    let result = alice.handle.toggle_screen_share().await;

    assert!(matches!(result, Err(CallError::InvalidState(_))));
    assert_eq!(alice.devices.display_media_calls(), 0);
    Ok(())
}

// ============================================================================
// Mute and camera
// ============================================================================

#[tokio::test]
async fn test_mute_and_camera_toggle_enabled_flags_only() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    connect(&alice, &bob, CallType::Video).await?;
    let ops_before = alice.peers.calls().len();

    assert!(alice.handle.toggle_mute().await?);
    assert!(alice.handle.toggle_camera().await?);

    let mic = alice.devices.track("alice-mic-1").unwrap();
    let cam = alice.devices.track("alice-cam-1").unwrap();
    assert!(!mic.is_enabled());
    assert!(!cam.is_enabled());

    let from_alice = &bob.snapshot().await.remote_streams[&alice.id()];
    assert!(from_alice.iter().all(|t| !t.enabled));

    let view = alice.snapshot().await;
    assert!(view.is_muted);
    assert!(view.is_camera_off);
    assert_eq!(alice.peers.calls().len(), ops_before);

    assert!(!alice.handle.toggle_mute().await?);
    assert!(mic.is_enabled());
    Ok(())
}

// ============================================================================
// Ending, rejecting, busy
// ============================================================================

#[tokio::test]
async fn test_end_call_twice_is_safe_and_releases_everything() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    connect(&alice, &bob, CallType::Video).await?;

    alice.handle.end_call().await?;
    alice.handle.end_call().await?;

    let view = alice.snapshot().await;
    assert_eq!(view.state, CallState::Ended);
    assert!(!view.in_call);
    assert!(view.remote_streams.is_empty());
    assert!(view.local_tracks.is_empty());
    assert!(alice.devices.tracks().iter().all(|t| t.is_stopped()));
    assert_eq!(alice.peers.count("close"), 1);

    // Ended accepts a new call
    bob.handle.end_call().await?;
    alice
        .handle
        .start_call(room(), bob.id(), CallType::Audio)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;
    Ok(())
}

#[tokio::test]
async fn test_reject_ends_caller_attempt() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Video)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;
    bob.handle.reject_call().await?;

    let bob_view = bob.snapshot().await;
    assert_eq!(bob_view.state, CallState::Idle);
    assert!(bob_view.incoming.is_none());
    assert_eq!(bob.peers.created(), 0);

    alice.wait_for(|s| s.state == CallState::Ended).await;
    assert!(alice.devices.tracks().iter().all(|t| t.is_stopped()));
    Ok(())
}

#[tokio::test]
async fn test_busy_callee_auto_rejects_second_caller() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    let carol = harness.endpoint("carol");
    connect(&alice, &bob, CallType::Audio).await?;

    carol
        .handle
        .start_call(room(), bob.id(), CallType::Audio)
        .await?;

    carol.wait_for(|s| s.state == CallState::Ended).await;
    let bob_view = bob.snapshot().await;
    assert_eq!(bob_view.state, CallState::Active);
    assert!(bob_view.incoming.is_none());
    assert_eq!(bob.peers.created(), 1);
    assert!(harness
        .router
        .delivered_to(carol.id())
        .contains(&ServerEvent::CallResponse {
            identity_id: bob.id(),
            accepted: false
        }));
    Ok(())
}

#[tokio::test]
async fn test_end_call_while_ringing_rejects() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Audio)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;
    bob.handle.end_call().await?;

    assert_eq!(bob.snapshot().await.state, CallState::Ended);
    alice.wait_for(|s| s.state == CallState::Ended).await;
    Ok(())
}

#[tokio::test]
async fn test_redial_while_ringing_replaces_pending_call() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Video)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;

    // alice hangs up before bob answers and calls again
    alice.handle.end_call().await?;
    alice
        .handle
        .start_call(room(), bob.id(), CallType::Audio)
        .await?;
    let ringing = bob
        .wait_for(|s| {
            s.incoming
                .as_ref()
                .is_some_and(|call| call.call_type == CallType::Audio)
        })
        .await;
    assert_eq!(ringing.state, CallState::Requesting);
    assert_eq!(ringing.incoming.unwrap().caller, alice.identity);

    bob.handle.accept_call().await?;
    alice.wait_for(is_active).await;
    bob.wait_for(is_active).await;

    assert_eq!(bob.peers.created(), 1);
    assert_eq!(bob.peers.count("set_remote:Offer"), 1);
    assert!(!harness
        .router
        .delivered_to(alice.id())
        .iter()
        .any(|event| matches!(event, ServerEvent::CallResponse { accepted: false, .. })));
    Ok(())
}

// ============================================================================
// Remote side leaving
// ============================================================================

#[tokio::test]
async fn test_remote_leaving_ends_active_call() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");
    connect(&alice, &bob, CallType::Video).await?;

    // someone else leaving the room does not touch the call
    bob.handle
        .deliver(ServerEvent::UserLeft {
            identity_id: UserId::new(),
        })
        .await?;
    bob.settle().await;
    assert_eq!(bob.snapshot().await.state, CallState::Active);

    bob.handle
        .deliver(ServerEvent::UserLeft {
            identity_id: alice.id(),
        })
        .await?;

    let view = bob.wait_for(|s| s.state == CallState::Ended).await;
    assert!(!view.in_call);
    assert!(view.remote_streams.is_empty());
    assert_eq!(bob.peers.count("close"), 1);
    assert!(bob.devices.tracks().iter().all(|t| t.is_stopped()));
    Ok(())
}

#[tokio::test]
async fn test_caller_leaving_while_ringing_clears_incoming() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint("bob");

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Audio)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;

    bob.handle
        .deliver(ServerEvent::UserLeft {
            identity_id: alice.id(),
        })
        .await?;

    let view = bob.wait_for(|s| s.state == CallState::Ended).await;
    assert!(view.incoming.is_none());
    assert!(matches!(
        bob.handle.accept_call().await,
        Err(CallError::InvalidState(_))
    ));
    // nobody is left to tell
    assert!(!harness
        .router
        .delivered_to(alice.id())
        .iter()
        .any(|event| matches!(event, ServerEvent::CallResponse { .. })));
    Ok(())
}

#[tokio::test]
async fn test_new_call_clears_previous_error() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint_with("bob", MockDevices::denying_display("bob"));
    connect(&alice, &bob, CallType::Video).await?;

    assert!(bob.handle.toggle_screen_share().await.is_err());
    assert!(bob.snapshot().await.last_error.is_some());

    bob.handle.end_call().await?;
    alice.handle.end_call().await?;
    bob.handle
        .start_call(room(), alice.id(), CallType::Audio)
        .await?;

    let view = bob.snapshot().await;
    assert_eq!(view.state, CallState::Requesting);
    assert!(view.last_error.is_none());
    Ok(())
}

// ============================================================================
// Media access denied
// ============================================================================

#[tokio::test]
async fn test_caller_media_denied_returns_to_idle() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint_with("alice", MockDevices::denying("alice"));
    let bob = harness.endpoint("bob");

    let result = alice
        .handle
        .start_call(room(), bob.id(), CallType::Video)
        .await;

    assert!(matches!(result, Err(CallError::MediaAccessDenied(_))));
    let view = alice.snapshot().await;
    assert_eq!(view.state, CallState::Idle);
    assert!(view.last_error.is_some());
    assert_eq!(alice.peers.created(), 0);
    assert!(harness.router.delivered_to(bob.id()).is_empty());
    Ok(())
}

#[tokio::test]
async fn test_callee_media_denied_declines_call() -> Result<()> {
    let harness = CallHarness::new();
    let alice = harness.endpoint("alice");
    let bob = harness.endpoint_with("bob", MockDevices::denying("bob"));

    alice
        .handle
        .start_call(room(), bob.id(), CallType::Video)
        .await?;
    bob.wait_for(|s| s.incoming.is_some()).await;

    let result = bob.handle.accept_call().await;

    assert!(matches!(result, Err(CallError::MediaAccessDenied(_))));
    assert_eq!(bob.snapshot().await.state, CallState::Idle);
    alice.wait_for(|s| s.state == CallState::Ended).await;
    Ok(())
}

// ============================================================================
// Session-level: candidate queueing and the error state
// ============================================================================

struct Bench {
    session: CallSession,
    sink: Arc<RecordingSink>,
    peers: Arc<MockPeerFactory>,
    _peer_events: mpsc::UnboundedReceiver<PeerEvent>,
}

fn bench(peers: impl FnOnce(UserId, MockNetwork) -> MockPeerFactory) -> Bench {
    let local = UserId::new();
    let peers = Arc::new(peers(local, MockNetwork::new()));
    let sink = Arc::new(RecordingSink::new());
    let (tx, rx) = mpsc::unbounded_channel();
    let session = CallSession::new(
        Arc::new(MockDevices::new("alice")),
        peers.clone(),
        sink.clone(),
        tx,
    );
    Bench {
        session,
        sink,
        peers,
        _peer_events: rx,
    }
}

fn signal(from: &Identity, payload: SignalPayload) -> ServerEvent {
    ServerEvent::Signal {
        sender_identity: from.clone(),
        payload,
    }
}

fn candidate(text: &str) -> SignalPayload {
    SignalPayload::IceCandidate {
        candidate: IceCandidate {
            candidate: text.to_string(),
            sdp_mid: None,
            sdp_m_line_index: None,
        },
    }
}

#[tokio::test]
async fn test_candidates_before_answer_are_applied_after_it_in_order() -> Result<()> {
    let mut bench = bench(MockPeerFactory::new);
    let bob = Identity::new(UserId::new(), "bob");
    bench
        .session
        .start_call(room(), bob.id, CallType::Audio)
        .await?;

    bench
        .session
        .handle_server_event(signal(&bob, candidate("cand-1")))
        .await?;
    bench
        .session
        .handle_server_event(signal(&bob, candidate("cand-2")))
        .await?;
    assert_eq!(bench.session.peer_link(bob.id).unwrap().pending_candidates(), 2);
    assert_eq!(bench.peers.count("add_ice"), 0);

    bench
        .session
        .handle_server_event(signal(
            &bob,
            SignalPayload::Answer {
                sdp: "v=0 answer".to_string(),
            },
        ))
        .await?;

    let ops = bench.peers.ops_with(bob.id);
    assert_eq!(
        &ops[ops.len() - 3..],
        &["set_remote:Answer", "add_ice:cand-1", "add_ice:cand-2"]
    );
    assert_eq!(*bench.session.state(), CallState::Negotiating);

    let sent = bench.sink.events();
    assert!(matches!(sent[0], ClientEvent::CallUser { .. }));
    assert!(matches!(
        sent[1],
        ClientEvent::Signal {
            payload: SignalPayload::Offer { .. },
            ..
        }
    ));
    Ok(())
}

#[tokio::test]
async fn test_failed_candidate_moves_to_error_until_end_call() -> Result<()> {
    let mut bench = bench(|local, network| {
        MockPeerFactory::new(local, network).with_failing_candidates()
    });
    let bob = Identity::new(UserId::new(), "bob");
    bench
        .session
        .start_call(room(), bob.id, CallType::Audio)
        .await?;
    bench
        .session
        .handle_server_event(signal(
            &bob,
            SignalPayload::Answer {
                sdp: "v=0 answer".to_string(),
            },
        ))
        .await?;

    let result = bench
        .session
        .handle_server_event(signal(&bob, candidate("cand-1")))
        .await;

    assert!(matches!(result, Err(CallError::Signaling(_))));
    assert!(matches!(bench.session.state(), CallState::Error { .. }));

    // absorbing: further signals are ignored
    bench
        .session
        .handle_server_event(signal(&bob, candidate("cand-2")))
        .await?;
    assert!(matches!(bench.session.state(), CallState::Error { .. }));
    assert!(matches!(
        bench
            .session
            .start_call(room(), bob.id, CallType::Audio)
            .await,
        Err(CallError::InvalidState(_))
    ));

    bench.session.end_call();
    assert_eq!(*bench.session.state(), CallState::Ended);
    assert_eq!(bench.peers.count("close"), 1);
    Ok(())
}

#[tokio::test]
async fn test_offer_on_caller_link_is_a_signaling_error() -> Result<()> {
    let mut bench = bench(MockPeerFactory::new);
    let bob = Identity::new(UserId::new(), "bob");
    bench
        .session
        .start_call(room(), bob.id, CallType::Audio)
        .await?;

    let result = bench
        .session
        .handle_server_event(signal(
            &bob,
            SignalPayload::Offer {
                sdp: "v=0 glare".to_string(),
            },
        ))
        .await;

    assert!(matches!(result, Err(CallError::Signaling(_))));
    assert!(matches!(bench.session.state(), CallState::Error { .. }));
    Ok(())
}

#[tokio::test]
async fn test_peer_factory_failure_moves_to_error() -> Result<()> {
    let mut bench = bench(MockPeerFactory::refusing);

    let result = bench
        .session
        .start_call(room(), UserId::new(), CallType::Audio)
        .await;

    assert!(matches!(result, Err(CallError::Connectivity(_))));
    assert!(matches!(bench.session.state(), CallState::Error { .. }));
    assert!(bench.sink.events().is_empty());

    bench.session.end_call();
    assert!(!bench.session.is_in_call());
    Ok(())
}

#[tokio::test]
async fn test_transport_gone_moves_to_error() -> Result<()> {
    let peers = Arc::new(MockPeerFactory::new(UserId::new(), MockNetwork::new()));
    let (tx, _rx) = mpsc::unbounded_channel();
    let mut session = CallSession::new(
        Arc::new(MockDevices::new("alice")),
        peers,
        Arc::new(RecordingSink::disconnected()),
        tx,
    );

    let result = session
        .start_call(room(), UserId::new(), CallType::Audio)
        .await;

    assert!(matches!(result, Err(CallError::Connectivity(_))));
    assert!(matches!(session.state(), CallState::Error { .. }));
    Ok(())
}

#[tokio::test]
async fn test_accept_without_peer_link_declines_call() -> Result<()> {
    let mut bench = bench(MockPeerFactory::refusing);
    let bob = Identity::new(UserId::new(), "bob");
    bench
        .session
        .handle_server_event(ServerEvent::CallRequest {
            caller_identity: bob.clone(),
            call_type: CallType::Audio,
        })
        .await?;
    bench
        .session
        .handle_server_event(signal(
            &bob,
            SignalPayload::Offer {
                sdp: "v=0 offer".to_string(),
            },
        ))
        .await?;

    let result = bench.session.accept_call().await;

    assert!(matches!(result, Err(CallError::Connectivity(_))));
    assert!(matches!(bench.session.state(), CallState::Error { .. }));
    assert_eq!(bench.session.queued_signals(bob.id), 0);
    assert_eq!(
        bench.sink.events(),
        vec![ClientEvent::CallResponse {
            target_identity_id: bob.id,
            accepted: false
        }]
    );

    bench.session.end_call();
    assert_eq!(*bench.session.state(), CallState::Ended);
    assert!(!bench.session.is_in_call());
    Ok(())
}

#[tokio::test]
async fn test_screen_share_only_while_active() -> Result<()> {
    let mut bench = bench(MockPeerFactory::new);
    let bob = Identity::new(UserId::new(), "bob");
    bench
        .session
        .start_call(room(), bob.id, CallType::Video)
        .await?;
    bench
        .session
        .handle_server_event(signal(
            &bob,
            SignalPayload::Answer {
                sdp: "v=0 answer".to_string(),
            },
        ))
        .await?;
    assert_eq!(*bench.session.state(), CallState::Negotiating);

    let result = bench.session.toggle_screen_share().await;

    assert!(matches!(result, Err(CallError::InvalidState(_))));
    assert_eq!(*bench.session.state(), CallState::Negotiating);
    assert_eq!(bench.peers.count("replace_track"), 0);
    Ok(())
}
