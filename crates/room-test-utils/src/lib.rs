//! # Room Test Utilities
//!
//! Shared test utilities for the room service.
//!
//! This crate provides:
//! - Server test harness (`TestRoomServer` for E2E tests)
//! - Realtime test client (`TestWsClient`)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> Result<()> {
//!     let server = TestRoomServer::spawn().await?;
//!     let alice = server.register("alice").await?;
//!
//!     let mut ws = TestWsClient::connect(&server.ws_url(), &alice.token).await?;
//!     ws.send(&ClientEvent::JoinRoom { room_id }).await?;
//!     Ok(())
//! }
//! ```

pub mod server_harness;
pub mod ws_client;

// Re-export commonly used items
pub use server_harness::*;
pub use ws_client::*;
