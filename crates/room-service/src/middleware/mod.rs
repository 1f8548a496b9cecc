//! HTTP middleware for the room service.
//!
//! # Components
//!
//! - `auth` - Bearer token authentication for protected routes
//! - `http_metrics` - HTTP request metrics

pub mod auth;
pub mod http_metrics;

pub use auth::{extract_bearer_token, require_auth, AuthState};
pub use http_metrics::http_metrics_middleware;
