//! HTTP request handlers for the room service.

pub mod auth;
pub mod health;
pub mod metrics;
pub mod rooms;

pub use auth::{login, register};
pub use health::health_check;
pub use metrics::metrics_handler;
pub use rooms::{create_room, get_room};
