//! Redacting wrappers for sensitive values.
//!
//! Account passwords, the token signing secret and bearer tokens travel as
//! [`SecretString`]. Its `Debug` prints `[REDACTED]`, so structs that derive
//! `Debug` and hold one are safe to log. Reading the value takes an explicit
//! `expose_secret()`.
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! let signing = SecretString::from("0123456789abcdef0123456789abcdef");
//! assert!(!format!("{signing:?}").contains("0123"));
//! assert_eq!(signing.expose_secret().len(), 32);
//! ```

pub use secrecy::{ExposeSecret, SecretString};
