//! Call Client Library
//!
//! The endpoint side of Huddle: a per-endpoint call state machine that
//! drives one peer connection per remote identity from request to active
//! media, and a room view that folds realtime events into room and chat
//! state.
//!
//! # Architecture
//!
//! ```text
//! ServerEvent ──┐
//! commands ─────┼──► CallSessionActor (owns CallSession) ──► SignalingSink
//! PeerEvent ────┘          │
//!                          ├──► MediaDevices (capture)
//!                          └──► PeerConnectionFactory ──► PeerLink (per remote)
//! ```
//!
//! The media engine, the peer connection and the realtime transport are
//! capability traits. The crate never captures media or touches the
//! network itself.
//!
//! # Modules
//!
//! - `actor` - `CallSessionActor` and its `CallSessionHandle`
//! - `errors` - `CallError`
//! - `media` - Media tracks, streams and capture devices
//! - `peer` - Peer connection capability and `PeerLink`
//! - `room_view` - Room, participants and chat log as seen by a client
//! - `session` - The call state machine
//! - `signaling` - Outbound realtime event sink

pub mod actor;
pub mod errors;
pub mod media;
pub mod peer;
pub mod room_view;
pub mod session;
pub mod signaling;

pub use actor::{CallSessionActor, CallSessionHandle};
pub use errors::CallError;
pub use room_view::RoomView;
pub use session::{CallSession, CallSnapshot, CallState, IncomingCall};
