//! Room Service
//!
//! Entry point for the Huddle room service. Serves the REST API and the
//! realtime WebSocket channel from one listener.

use room_service::auth::{AccountStore, TokenService};
use room_service::config::Config;
use room_service::observability::metrics::init_metrics_recorder;
use room_service::registry::RegistryActor;
use room_service::routes::{self, AppState};
use room_service::tasks::start_pending_room_sweeper;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "room_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Room Service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        bcrypt_cost = config.bcrypt_cost,
        connection_buffer = config.connection_buffer,
        token_ttl_seconds = config.token_ttl.as_secs(),
        pending_room_ttl_seconds = config.pending_room_ttl.as_secs(),
        "Configuration loaded successfully"
    );

    // Initialize Prometheus metrics recorder before anything records
    let metrics_handle = init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics recorder: {}", e);
        e
    })?;

    // Root token: cancels the registry and every open connection
    let shutdown = CancellationToken::new();

    let (registry, registry_task) = RegistryActor::spawn(shutdown.child_token());
    info!("Room registry started");

    let sweeper_task = tokio::spawn(start_pending_room_sweeper(
        registry.clone(),
        config.pending_room_sweep_interval,
        config.pending_room_ttl,
        shutdown.child_token(),
    ));

    let addr: SocketAddr = config.bind_address.parse().map_err(|e| {
        error!("Invalid bind address: {}", e);
        e
    })?;

    let state = Arc::new(AppState {
        tokens: TokenService::from_config(&config),
        accounts: AccountStore::new(config.bcrypt_cost),
        registry,
        config,
        shutdown: shutdown.clone(),
    });

    let app = routes::build_routes(state, metrics_handle);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Room Service listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // Stop anything still running (idle sockets, the registry actor)
    shutdown.cancel();
    if let Err(e) = sweeper_task.await {
        warn!("Pending room sweeper ended abnormally: {}", e);
    }
    if let Err(e) = registry_task.await {
        warn!("Registry task ended abnormally: {}", e);
    }

    info!("Room Service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
///
/// Cancels `shutdown` when a signal arrives so open realtime connections
/// close and let the server drain.
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }

    shutdown.cancel();
}
