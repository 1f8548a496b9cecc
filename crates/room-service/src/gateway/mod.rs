//! Connection gateway.
//!
//! Authenticates realtime connections at upgrade time and runs one session
//! per accepted socket:
//!
//! ```text
//! socket ──read──► Session::handle_frame ──► RegistryHandle
//! socket ◄─write── writer task ◄── outbound queue ◄── ConnectionHandle
//! ```
//!
//! A connection never exists in an unauthenticated state: the token is
//! verified before the upgrade and a failure is answered with HTTP 401.

pub mod session;
pub mod upgrade;

pub use session::Session;
pub use upgrade::ws_handler;
