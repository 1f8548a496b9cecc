//! HTTP routes for the room service.
//!
//! Defines the Axum router and application state.

use crate::auth::{AccountStore, TokenService};
use crate::config::Config;
use crate::gateway;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, AuthState};
use crate::registry::RegistryHandle;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Handle to the room registry actor.
    pub registry: RegistryHandle,

    /// Registered accounts.
    pub accounts: AccountStore,

    /// Issues and verifies user tokens.
    pub tokens: TokenService,

    /// Parent token for every realtime connection. Cancelled on shutdown.
    pub shutdown: CancellationToken,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health` - Liveness and registry counts - public
/// - `/metrics` - Prometheus metrics endpoint - public
/// - `/api/register`, `/api/login` - Account endpoints - public
/// - `/ws` - Realtime channel, token checked before upgrade
/// - `/api/rooms`, `/api/rooms/:room_id` - Room endpoints - requires authentication
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let auth_state = Arc::new(AuthState {
        tokens: state.tokens.clone(),
    });

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        // The gateway authenticates the upgrade itself so it can accept a
        // query-string token as well as the header
        .route("/ws", get(gateway::ws_handler))
        .with_state(state.clone());

    // Metrics route with its own state
    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Protected routes (authentication required)
    let protected_routes = Router::new()
        .route("/api/rooms", post(handlers::create_room))
        .route("/api/rooms/:room_id", get(handlers::get_room))
        .route_layer(middleware::from_fn_with_state(auth_state, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. TraceLayer - Log request details
    // 3. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}
