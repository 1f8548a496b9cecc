//! User tokens: HS256 JWTs carrying the identity id and username.
//!
//! Verification checks, in order:
//! - size, before any decoding (tokens over `MAX_JWT_SIZE_BYTES`)
//! - signature, with the algorithm pinned to HS256 whatever the header says
//! - expiry
//! - `iat` no further in the future than the configured clock skew
//!
//! Every failure maps to the same client-facing message. The reason is only
//! logged at debug.
//!
//! # Usage
//!
//! ```rust,ignore
//! use common::jwt::{sign_user_token, verify_user_token, UserClaims, DEFAULT_CLOCK_SKEW};
//!
//! let token = sign_user_token(&claims, &secret)?;
//! let claims = verify_user_token(&token, &secret, DEFAULT_CLOCK_SKEW)?;
//! ```

use crate::secret::{ExposeSecret, SecretString};
use crate::types::{Identity, UserId};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Maximum allowed JWT size in bytes (8KB).
///
/// Typical user tokens are well under 300 bytes. Anything larger is
/// rejected before base64 decoding or signature checks run.
pub const MAX_JWT_SIZE_BYTES: usize = 8192; // 8KB

/// Default JWT clock skew tolerance (5 minutes).
///
/// Tokens with `iat` (issued-at) timestamps more than this amount in the
/// future are rejected.
pub const DEFAULT_CLOCK_SKEW: Duration = Duration::from_secs(300);

/// Maximum allowed JWT clock skew tolerance (10 minutes).
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(600);

/// Default user token lifetime (24 hours).
pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during JWT validation.
///
/// Note: Error messages are intentionally generic to prevent information leakage.
/// Detailed information is logged at debug level for troubleshooting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtValidationError {
    /// Token size exceeds maximum allowed.
    #[error("The access token is invalid or expired")]
    TokenTooLarge,

    /// Token format, signature or claims are invalid.
    #[error("The access token is invalid or expired")]
    InvalidToken,

    /// Token `exp` claim is in the past.
    #[error("The access token is invalid or expired")]
    Expired,

    /// Token `iat` claim is too far in the future.
    #[error("The access token is invalid or expired")]
    IatTooFarInFuture,
}

/// Errors that can occur while signing a token.
#[derive(Error, Debug)]
pub enum JwtSigningError {
    #[error("Token signing failed: {0}")]
    Signing(String),
}

// =============================================================================
// Claims Types
// =============================================================================

/// User token claims.
///
/// # Fields
///
/// - `sub`: Subject (user id)
/// - `username`: Registered username, used as the display name
/// - `iat`: Issued-at timestamp (Unix epoch seconds)
/// - `exp`: Expiration timestamp (Unix epoch seconds)
///
/// # Security
///
/// The `sub` field is redacted in Debug output.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserClaims {
    /// Subject (user id) - redacted in Debug output.
    pub sub: UserId,

    /// Registered username.
    pub username: String,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for UserClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserClaims")
            .field("sub", &"[REDACTED]")
            .field("username", &self.username)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl UserClaims {
    /// Build claims for `identity`, issued now and valid for `ttl`.
    #[must_use]
    pub fn for_identity(identity: &Identity, ttl: Duration) -> Self {
        let now = chrono::Utc::now().timestamp();
        // Safe cast: token lifetimes are configured in seconds, far below i64::MAX
        #[allow(clippy::cast_possible_wrap)]
        let ttl_secs = ttl.as_secs() as i64;

        Self {
            sub: identity.id,
            username: identity.display_name.clone(),
            iat: now,
            exp: now.saturating_add(ttl_secs),
        }
    }

    /// The identity these claims describe.
    #[must_use]
    pub fn identity(&self) -> Identity {
        Identity::new(self.sub, self.username.clone())
    }
}

// =============================================================================
// Functions
// =============================================================================

/// Sign user claims with the shared HS256 secret.
///
/// # Errors
///
/// Returns `JwtSigningError::Signing` if encoding fails.
pub fn sign_user_token(
    claims: &UserClaims,
    secret: &SecretString,
) -> Result<String, JwtSigningError> {
    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".to_string());

    let key = EncodingKey::from_secret(secret.expose_secret().as_bytes());

    encode(&header, claims, &key).map_err(|e| JwtSigningError::Signing(e.to_string()))
}

/// Verify a user token and return its claims.
///
/// # Security Checks
///
/// 1. Size check - reject tokens > 8KB before parsing
/// 2. Verify HS256 signature
/// 3. Validate exp claim (reject expired tokens)
/// 4. Validate iat claim with clock skew tolerance
///
/// # Errors
///
/// Returns a `JwtValidationError`. Every variant renders the same generic
/// message.
pub fn verify_user_token(
    token: &str,
    secret: &SecretString,
    clock_skew: Duration,
) -> Result<UserClaims, JwtValidationError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        tracing::debug!(
            target: "common.jwt",
            token_size = token.len(),
            max_size = MAX_JWT_SIZE_BYTES,
            "Token rejected: size exceeds maximum allowed"
        );
        return Err(JwtValidationError::TokenTooLarge);
    }

    let key = DecodingKey::from_secret(secret.expose_secret().as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);

    let data = decode::<UserClaims>(token, &key, &validation).map_err(|e| {
        tracing::debug!(target: "common.jwt", error = %e, "Token verification failed");
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtValidationError::Expired,
            _ => JwtValidationError::InvalidToken,
        }
    })?;

    validate_iat(data.claims.iat, clock_skew)?;

    Ok(data.claims)
}

/// Validate the `iat` (issued-at) claim with clock skew tolerance.
///
/// Rejects tokens with `iat` too far in the future, which could indicate
/// token pre-generation or clock synchronization issues.
///
/// # Errors
///
/// Returns `JwtValidationError::IatTooFarInFuture` if the iat timestamp is more than
/// `clock_skew` in the future.
pub fn validate_iat(iat: i64, clock_skew: Duration) -> Result<(), JwtValidationError> {
    let now = chrono::Utc::now().timestamp();
    validate_iat_at(iat, clock_skew, now)
}

/// Deterministic `iat` validation against an explicit `now` timestamp.
pub(crate) fn validate_iat_at(
    iat: i64,
    clock_skew: Duration,
    now: i64,
) -> Result<(), JwtValidationError> {
    // Safe cast: clock_skew is bounded to MAX_CLOCK_SKEW (600 seconds), well within i64 range
    #[allow(clippy::cast_possible_wrap)]
    let clock_skew_secs = clock_skew.as_secs() as i64;
    let max_iat = now + clock_skew_secs;

    if iat > max_iat {
        tracing::debug!(
            target: "common.jwt",
            iat = iat,
            now = now,
            max_allowed = max_iat,
            clock_skew_secs = clock_skew_secs,
            "Token rejected: iat too far in the future"
        );
        return Err(JwtValidationError::IatTooFarInFuture);
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn test_secret() -> SecretString {
        SecretString::from("test-secret-that-is-at-least-32-bytes-long")
    }

    fn alice() -> Identity {
        Identity::new(UserId::new(), "alice")
    }

    #[test]
    fn test_sign_and_verify() {
        let identity = alice();
        let claims = UserClaims::for_identity(&identity, DEFAULT_TOKEN_TTL);

        let token = sign_user_token(&claims, &test_secret()).unwrap();
        let verified = verify_user_token(&token, &test_secret(), DEFAULT_CLOCK_SKEW).unwrap();

        assert_eq!(verified, claims);
        assert_eq!(verified.identity(), identity);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let claims = UserClaims::for_identity(&alice(), DEFAULT_TOKEN_TTL);
        let token = sign_user_token(&claims, &test_secret()).unwrap();

        let other = SecretString::from("a-completely-different-secret-value!!");
        assert_eq!(
            verify_user_token(&token, &other, DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::InvalidToken)
        );
    }

    #[test]
    fn test_expired_token_rejected() {
        let mut claims = UserClaims::for_identity(&alice(), DEFAULT_TOKEN_TTL);
        claims.iat -= 7200;
        claims.exp = claims.iat + 60;

        let token = sign_user_token(&claims, &test_secret()).unwrap();
        assert_eq!(
            verify_user_token(&token, &test_secret(), DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::Expired)
        );
    }

    #[test]
    fn test_future_iat_rejected() {
        let mut claims = UserClaims::for_identity(&alice(), DEFAULT_TOKEN_TTL);
        claims.iat += 3600;

        let token = sign_user_token(&claims, &test_secret()).unwrap();
        assert_eq!(
            verify_user_token(&token, &test_secret(), DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::IatTooFarInFuture)
        );
    }

    #[test]
    fn test_oversized_token_rejected() {
        let token = "a".repeat(MAX_JWT_SIZE_BYTES + 1);
        assert_eq!(
            verify_user_token(&token, &test_secret(), DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::TokenTooLarge)
        );
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert_eq!(
            verify_user_token("not.a.jwt", &test_secret(), DEFAULT_CLOCK_SKEW),
            Err(JwtValidationError::InvalidToken)
        );
    }

    #[test]
    fn test_validate_iat_boundaries() {
        let now = 1_700_000_000;
        let skew = Duration::from_secs(300);

        assert!(validate_iat_at(now, skew, now).is_ok());
        assert!(validate_iat_at(now + 300, skew, now).is_ok());
        assert_eq!(
            validate_iat_at(now + 301, skew, now),
            Err(JwtValidationError::IatTooFarInFuture)
        );
        assert!(validate_iat_at(now - 86_400, skew, now).is_ok());
    }

    #[test]
    fn test_error_messages_are_generic() {
        let messages: Vec<String> = [
            JwtValidationError::TokenTooLarge,
            JwtValidationError::InvalidToken,
            JwtValidationError::Expired,
            JwtValidationError::IatTooFarInFuture,
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        assert!(messages
            .iter()
            .all(|m| m == "The access token is invalid or expired"));
    }

    #[test]
    fn test_claims_debug_redacts_sub() {
        let claims = UserClaims::for_identity(&alice(), DEFAULT_TOKEN_TTL);
        let debug_str = format!("{claims:?}");

        assert!(!debug_str.contains(&claims.sub.to_string()));
        assert!(debug_str.contains("[REDACTED]"));
        assert!(debug_str.contains("alice"));
    }
}
