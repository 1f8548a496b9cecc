//! Authentication for the room service.
//!
//! - `accounts` - in-memory account store with bcrypt password hashes
//! - `tokens` - issue and verify HS256 user tokens
//!
//! Everything downstream of this module consumes a verified `Identity`.

pub mod accounts;
pub mod tokens;

pub use accounts::AccountStore;
pub use tokens::TokenService;
