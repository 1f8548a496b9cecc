//! Common utilities and types shared across Huddle components.

#![warn(clippy::pedantic)]

/// Module for identifier types and the authenticated identity
pub mod types;

/// Module for the realtime wire protocol (client and server events)
pub mod protocol;

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for user token issuing and validation
pub mod jwt;
