//! Room Service Library
//!
//! Core of the Huddle room service: identities join rooms, chat, and
//! negotiate 1:1 calls whose WebRTC signaling the service relays without
//! interpreting it.
//!
//! # Architecture
//!
//! ```text
//! HTTP ──► routes ──► handlers ──┐
//!                                 ├──► RegistryHandle ──► RegistryActor (owns RoomArena)
//! WS ────► gateway ──► session ──┘          │
//!                ▲                          │ deliveries
//!                └──── ConnectionHandle ◄───┘
//! ```
//!
//! All room, membership and message-log state lives in a single
//! `RegistryActor`. Every inbound event is one mailbox message that runs to
//! completion before the next, so the registry needs no locks and every
//! fan-out is observed in the same order by all members.
//!
//! # Modules
//!
//! - `auth` - Account store and user token service
//! - `config` - Service configuration from environment
//! - `errors` - Error types with HTTP status code mapping
//! - `gateway` - WebSocket upgrade, connection authentication and sessions
//! - `handlers` - HTTP request handlers
//! - `middleware` - Bearer token authentication
//! - `models` - Request/response bodies
//! - `observability` - Metrics
//! - `registry` - Room registry actor, message relay and call signaling
//! - `routes` - Axum router setup
//! - `tasks` - Background tasks (pending room sweeper)

pub mod auth;
pub mod config;
pub mod errors;
pub mod gateway;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod registry;
pub mod routes;
pub mod tasks;
