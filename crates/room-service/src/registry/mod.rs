//! Room registry, message relay and call signaling.
//!
//! All state lives in the `RegistryActor`. The gateway and HTTP handlers
//! talk to it through a cloneable `RegistryHandle`.

pub mod actor;
pub mod arena;
pub mod connection;
pub mod messages;
pub mod relay;
pub mod signaling;

pub use actor::{RegistryActor, RegistryHandle};
pub use arena::JoinSnapshot;
pub use connection::ConnectionHandle;
pub use messages::RegistryStats;
