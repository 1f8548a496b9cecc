//! User token service.
//!
//! Thin wrapper over `common::jwt` holding the signing secret and the
//! configured lifetime and clock skew.

use crate::config::Config;
use crate::errors::RoomError;

use common::jwt::{sign_user_token, verify_user_token, UserClaims};
use common::secret::SecretString;
use common::types::Identity;
use std::time::Duration;
use tracing::{debug, instrument};

/// Issues and verifies user tokens.
#[derive(Clone)]
pub struct TokenService {
    secret: SecretString,
    ttl: Duration,
    clock_skew: Duration,
}

impl TokenService {
    /// Create a token service from explicit parts.
    #[must_use]
    pub fn new(secret: SecretString, ttl: Duration, clock_skew: Duration) -> Self {
        Self {
            secret,
            ttl,
            clock_skew,
        }
    }

    /// Create a token service from the service configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.jwt_secret.clone(),
            config.token_ttl,
            config.jwt_clock_skew,
        )
    }

    /// Issue a token for `identity`.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Crypto` if signing fails.
    #[instrument(skip_all, name = "room.auth.issue")]
    pub fn issue(&self, identity: &Identity) -> Result<String, RoomError> {
        let claims = UserClaims::for_identity(identity, self.ttl);
        sign_user_token(&claims, &self.secret).map_err(|e| RoomError::Crypto(e.to_string()))
    }

    /// Verify a token and return the identity it was issued for.
    ///
    /// # Errors
    ///
    /// Returns `RoomError::Unauthorized` with a generic message for every
    /// failure mode.
    #[instrument(skip_all, name = "room.auth.verify")]
    pub fn verify(&self, token: &str) -> Result<Identity, RoomError> {
        let claims = verify_user_token(token, &self.secret, self.clock_skew).map_err(|e| {
            debug!(target: "room.auth", error = ?e, "Token rejected");
            RoomError::Unauthorized(e.to_string())
        })?;
        Ok(claims.identity())
    }
}
