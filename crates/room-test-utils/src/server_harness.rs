//! Test server harness for E2E testing
//!
//! Provides `TestRoomServer` for spawning real room service instances in
//! tests.

use common::types::{Identity, RoomId, UserId};
use metrics_exporter_prometheus::PrometheusBuilder;
use room_service::auth::{AccountStore, TokenService};
use room_service::config::{Config, MIN_BCRYPT_COST};
use room_service::registry::RegistryActor;
use room_service::routes::{self, AppState};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Signing secret used by every test server.
pub const TEST_JWT_SECRET: &str = "room-test-secret-0123456789abcdef";

/// A registered test account.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub token: String,
    pub identity: Identity,
}

/// Test harness for spawning the room service in E2E tests.
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_health_flow_e2e() -> Result<()> {
///     let server = TestRoomServer::spawn().await?;
///
///     let response = reqwest::get(format!("{}/health", server.url())).await?;
///
///     assert_eq!(response.status(), 200);
///     Ok(())
/// }
/// ```
pub struct TestRoomServer {
    addr: SocketAddr,
    state: Arc<AppState>,
    client: reqwest::Client,
    _handle: JoinHandle<()>,
}

impl TestRoomServer {
    /// Spawn a new test server instance with empty registry and accounts.
    ///
    /// The server will:
    /// - Bind to a random available port (127.0.0.1:0)
    /// - Use the lowest accepted bcrypt cost
    /// - Start the HTTP server in the background
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(HashMap::new()).await
    }

    /// Spawn a test server with extra configuration variables layered over
    /// the test defaults.
    pub async fn spawn_with(overrides: HashMap<String, String>) -> Result<Self, anyhow::Error> {
        let mut vars = HashMap::from([
            ("JWT_SECRET".to_string(), TEST_JWT_SECRET.to_string()),
            ("BIND_ADDRESS".to_string(), "127.0.0.1:0".to_string()),
            ("BCRYPT_COST".to_string(), MIN_BCRYPT_COST.to_string()),
        ]);
        vars.extend(overrides);

        let config = Config::from_vars(&vars)
            .map_err(|e| anyhow::anyhow!("Failed to create config: {}", e))?;

        let shutdown = CancellationToken::new();
        let (registry, _registry_task) = RegistryActor::spawn(shutdown.child_token());

        let state = Arc::new(AppState {
            tokens: TokenService::from_config(&config),
            accounts: AccountStore::new(config.bcrypt_cost),
            registry,
            config,
            shutdown,
        });

        // Non-installed recorder: tests must not fight over the global one
        let metrics_handle = PrometheusBuilder::new().build_recorder().handle();

        // Build routes using room-service's real route builder
        let app = routes::build_routes(state.clone(), metrics_handle);

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind test server: {}", e))?;

        let addr = listener
            .local_addr()
            .map_err(|e| anyhow::anyhow!("Failed to get local address: {}", e))?;

        // Spawn server in background
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Test server error: {}", e);
            }
        });

        Ok(Self {
            addr,
            state,
            client: reqwest::Client::new(),
            _handle: handle,
        })
    }

    /// Get the base URL of the test server.
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get the realtime endpoint URL.
    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Get the socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get reference to the shared application state.
    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Get a shared HTTP client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Register an account with password `"password"` and return its token
    /// and identity.
    pub async fn register(&self, username: &str) -> Result<TestUser, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/register", self.url()))
            .json(&serde_json::json!({ "username": username, "password": "password" }))
            .send()
            .await?;

        anyhow::ensure!(
            response.status() == reqwest::StatusCode::CREATED,
            "register {} failed with {}",
            username,
            response.status()
        );

        let body: serde_json::Value = response.json().await?;
        let token = body["token"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("register response missing token"))?
            .to_string();
        let user_id: UserId = serde_json::from_value(body["userId"].clone())?;

        Ok(TestUser {
            token,
            identity: Identity::new(user_id, username),
        })
    }

    /// Create a room as `user` and return its id.
    pub async fn create_room(&self, user: &TestUser) -> Result<RoomId, anyhow::Error> {
        let response = self
            .client
            .post(format!("{}/api/rooms", self.url()))
            .bearer_auth(&user.token)
            .send()
            .await?;

        anyhow::ensure!(
            response.status() == reqwest::StatusCode::CREATED,
            "create room failed with {}",
            response.status()
        );

        let body: serde_json::Value = response.json().await?;
        Ok(serde_json::from_value(body["roomId"].clone())?)
    }
}

impl Drop for TestRoomServer {
    fn drop(&mut self) {
        // Stop the registry and every open session, then the listener
        self.state.shutdown.cancel();
        self._handle.abort();
    }
}
