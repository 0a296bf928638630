//! Skycast HTTP API
//!
//! HTTP layer for Skycast, built with Axum.
//!
//! # Endpoints
//!
//! ## Streaming
//! - `GET /ws` - WebSocket upgrade, receives htmx out-of-band fragments
//!
//! ## Admin
//! - `POST /update-city` - Change the published location
//!
//! ## Weather
//! - `GET /api/weather` - Latest snapshot as JSON
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health` - Full health status
//!
//! Anything else falls through to the static dashboard directory when one
//! is configured.
//!
//! # Example
//!
//! ```rust,ignore
//! use skycast::api::{serve, AppState};
//! use skycast::config::Config;
//!
//! let config = Config::load_with_env(None)?;
//! let state = AppState::new(config.server.clone(), registry, latest, session, shutdown);
//! serve(state, &config.server).await?;
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/", get(routes::health::full_health));

    let static_dir = state.config.static_dir.clone();
    let shared_state = Arc::new(state);

    let router = Router::new()
        .route("/ws", get(websocket_handler))
        .route("/update-city", post(routes::location::update_city))
        .route("/api/weather", get(routes::weather::latest_weather))
        .nest("/health", health_routes);

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(TraceLayer::new_for_http())
        .with_state(shared_state)
}

/// Start the server
///
/// Runs until a shutdown signal arrives or `state.shutdown` is cancelled
/// elsewhere. Either way the token is cancelled on the way out so every
/// session closes its socket.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let shutdown = state.shutdown.clone();
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Skycast listening on {}", addr);

    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)));

    shutdown.cancel();
    result?;

    tracing::info!("Skycast shut down gracefully");
    Ok(())
}

/// Wait for a shutdown signal or for the token to be cancelled
async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
        _ = shutdown.cancelled() => {},
    }

    shutdown.cancel();
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
