//! Observability for the room service.
//!
//! Provides metrics definitions and recording helpers.

pub mod metrics;
