mod error;
mod extractors;
mod handlers;
mod routes;
pub mod security;
mod state;

pub use error::{AppError, AppResult};
pub use state::AppState;

use crate::services::rate_limit::RateLimiter;
use crate::{Config, Database};
use anyhow::Result;
use axum::http::{header, Method};
use axum::middleware;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the full router with middleware applied.
pub fn app(state: Arc<AppState>) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .merge(routes::api_routes())
        .merge(routes::public_routes())
        .layer(middleware::from_fn(security::apply_security_headers))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(config: Config, db: Database, addr: &str) -> Result<()> {
    let state = Arc::new(AppState::new(config, db));

    let sweep_every = state.config.rate_limit.sweep_interval_secs;
    if sweep_every > 0 {
        let limiter = state.rate_limiter.clone();
        let window = state.config.rate_limit.create_window();
        tokio::spawn(run_sweep_job(limiter, window, Duration::from_secs(sweep_every)));
    }

    let app = app(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);
    let app = app.into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).await?;

    Ok(())
}

async fn run_sweep_job(limiter: Arc<RateLimiter>, window: Duration, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // first tick completes immediately
    interval.tick().await;
    loop {
        interval.tick().await;
        let removed = limiter.sweep(window);
        if removed > 0 {
            tracing::debug!("Swept {} idle rate limit entries", removed);
        }
    }
}
