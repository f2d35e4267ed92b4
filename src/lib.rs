//! Request-boundary gateway for the classifieds marketplace.
//!
//! Sits in front of the hosted auth backend and gives every guarded route
//! two in-process helpers:
//!
//! - [`rate_limit::RateLimiter`]: fixed-window request counting per caller
//!   identifier (first `x-forwarded-for` hop, `x-real-ip`, or socket peer).
//! - [`cache::ResponseCache`]: small response fragments (the caller's session)
//!   bounded by TTL and by entry count with LRU eviction.
//!
//! Both live in [`state::AppState`], one instance per server. Nothing is
//! shared between processes, so each replica of a scaled-out deployment
//! limits and caches on its own.

use axum::{Router, middleware::from_fn_with_state, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod state;
pub mod upstream;

use config::Args;
use error::GatewayError;
use handlers::{health_handler, logout_handler, metrics_handler, session_handler};
use middleware::rate_limit_layer;
use state::AppState;

// Routes under /api go through the rate limiter, health and metrics don't
pub fn app(state: Arc<AppState>) -> Router {
    let guarded = Router::new()
        .route("/api/session", get(session_handler).delete(logout_handler))
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(guarded)
        .with_state(state)
}

pub async fn run(args: Args) -> Result<(), GatewayError> {
    let state = AppState::from_args(&args)?;

    info!(upstream = %state.auth.base_url(), "Forwarding session lookups");
    info!(
        ttl_ms = args.cache_ttl_ms,
        max_size = args.cache_max_size,
        "Session cache configured"
    );
    info!(
        max_requests = args.rate_limit,
        window_ms = args.rate_window_ms,
        "Rate limit configured"
    );

    let address = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&address)
        .await
        .map_err(|source| GatewayError::Bind {
            address: address.clone(),
            source,
        })?;
    info!("Gateway running on {address}");

    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| GatewayError::Internal(e.to_string()))?;

    info!("Gateway shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
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
    }
}
