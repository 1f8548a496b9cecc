//! In-memory account store.
//!
//! Accounts live for the process lifetime, keyed by username. Passwords are
//! stored as bcrypt hashes; hashing and verification run on the blocking
//! pool so they never stall the async workers.

use crate::config::{MAX_BCRYPT_COST, MIN_BCRYPT_COST};
use crate::errors::RoomError;

use common::secret::{ExposeSecret, SecretString};
use common::types::{Identity, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

/// Hash verified when the username is unknown, so a miss costs the same as
/// a wrong password.
const DUMMY_PASSWORD_HASH: &str = "$2b$12$LQv3c1yqBWVHxkd0LHAkCOYz6TtxMQJqhN8/LewY5GyYqExt7YD3a";

#[derive(Clone)]
struct AccountRecord {
    user_id: UserId,
    username: String,
    password_hash: String,
}

impl AccountRecord {
    fn identity(&self) -> Identity {
        Identity::new(self.user_id, self.username.clone())
    }
}

/// Registered accounts.
#[derive(Clone)]
pub struct AccountStore {
    accounts: Arc<RwLock<HashMap<String, AccountRecord>>>,
    bcrypt_cost: u32,
}

impl AccountStore {
    /// Create an empty store hashing with `bcrypt_cost`.
    #[must_use]
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            bcrypt_cost,
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// - `RoomError::BadRequest` if the username or password is empty
    /// - `RoomError::Conflict` if the username is taken
    /// - `RoomError::Crypto` if hashing fails
    #[instrument(skip_all, name = "room.auth.register")]
    pub async fn register(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Identity, RoomError> {
        let username = username.trim();
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(RoomError::BadRequest(
                "Username and password are required".to_string(),
            ));
        }

        if self.accounts.read().await.contains_key(username) {
            return Err(RoomError::Conflict("Username already taken".to_string()));
        }

        let password_hash = hash_password_blocking(password.clone(), self.bcrypt_cost).await?;

        // Re-check under the write lock: another registration may have
        // claimed the name while we were hashing.
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(username) {
            return Err(RoomError::Conflict("Username already taken".to_string()));
        }

        let record = AccountRecord {
            user_id: UserId::new(),
            username: username.to_string(),
            password_hash,
        };
        let identity = record.identity();
        accounts.insert(record.username.clone(), record);

        info!(target: "room.auth", user_id = %identity.id, "Account registered");
        Ok(identity)
    }

    /// Check credentials and return the account's identity.
    ///
    /// # Errors
    ///
    /// - `RoomError::BadRequest` if the username or password is empty
    /// - `RoomError::Unauthorized` if the username is unknown or the
    ///   password does not match
    #[instrument(skip_all, name = "room.auth.login")]
    pub async fn login(
        &self,
        username: &str,
        password: &SecretString,
    ) -> Result<Identity, RoomError> {
        let username = username.trim();
        if username.is_empty() || password.expose_secret().is_empty() {
            return Err(RoomError::BadRequest(
                "Username and password are required".to_string(),
            ));
        }

        let record = self.accounts.read().await.get(username).cloned();

        let hash_to_verify = record
            .as_ref()
            .map_or_else(|| DUMMY_PASSWORD_HASH.to_string(), |r| r.password_hash.clone());
        let is_valid = verify_password_blocking(password.clone(), hash_to_verify).await;

        match (record, is_valid) {
            (Some(record), Ok(true)) => {
                info!(target: "room.auth", user_id = %record.user_id, "Login succeeded");
                Ok(record.identity())
            }
            (Some(_), Err(e)) => Err(e),
            _ => {
                warn!(target: "room.auth", "Login failed: invalid credentials");
                Err(RoomError::Unauthorized("Invalid credentials".to_string()))
            }
        }
    }

    /// Number of registered accounts.
    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    /// Whether no account is registered.
    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

/// Hash a password with bcrypt.
///
/// # Errors
///
/// Returns `RoomError::Crypto` if the cost is outside 10-14 or hashing
/// fails.
pub fn hash_password(password: &str, cost: u32) -> Result<String, RoomError> {
    if !(MIN_BCRYPT_COST..=MAX_BCRYPT_COST).contains(&cost) {
        return Err(RoomError::Crypto(format!(
            "Invalid bcrypt cost: {cost} (must be {MIN_BCRYPT_COST}-{MAX_BCRYPT_COST})"
        )));
    }

    bcrypt::hash(password, cost)
        .map_err(|e| RoomError::Crypto(format!("Password hashing failed: {e}")))
}

/// Verify a password against a bcrypt hash.
///
/// # Errors
///
/// Returns `RoomError::Crypto` if the hash is malformed.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, RoomError> {
    bcrypt::verify(password, hash)
        .map_err(|e| RoomError::Crypto(format!("Password verification failed: {e}")))
}

async fn hash_password_blocking(password: SecretString, cost: u32) -> Result<String, RoomError> {
    tokio::task::spawn_blocking(move || hash_password(password.expose_secret(), cost))
        .await
        .map_err(|e| RoomError::Internal(format!("hashing task failed: {e}")))?
}

async fn verify_password_blocking(password: SecretString, hash: String) -> Result<bool, RoomError> {
    tokio::task::spawn_blocking(move || verify_password(password.expose_secret(), &hash))
        .await
        .map_err(|e| RoomError::Internal(format!("verification task failed: {e}")))?
}
