//! # Call Test Utilities
//!
//! Mock media engine, peer connections and signaling for exercising the
//! call client without a browser or a server.
//!
//! ## Modules
//!
//! - `mock_media` - `MockTrack` and `MockDevices`
//! - `mock_peer` - `MockNetwork`, `MockPeerFactory` and `MockPeerConnection`
//! - `mock_signaling` - `RecordingSink` and the in-process `LoopbackRouter`
//! - `harness` - Two or more wired call endpoints
//!
//! ## Usage
//!
//! ```rust,ignore
//! use call_test_utils::CallHarness;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let harness = CallHarness::new();
//!     let alice = harness.endpoint("alice");
//!     let bob = harness.endpoint("bob");
//!
//!     alice.handle.start_call(room, bob.identity.id, CallType::Video).await?;
//!     bob.wait_for(|s| s.incoming.is_some()).await;
//!     bob.handle.accept_call().await?;
//!     alice.wait_for(|s| s.state == CallState::Active).await;
//! }
//! ```
//!
//! Peer connections share a `MockNetwork`: a remote track seen by one
//! endpoint reads the other endpoint's current sender, so `replace_track`
//! on one side is visible on the other with no renegotiation.

pub mod harness;
pub mod mock_media;
pub mod mock_peer;
pub mod mock_signaling;

pub use harness::*;
pub use mock_media::*;
pub use mock_peer::*;
pub use mock_signaling::*;
