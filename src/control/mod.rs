//! Control server: Axum REST API for status, queueing and stop requests.
//!
//! CORS enabled for local tooling.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

pub use routes::{ActiveChallenge, ControlHandle, RepeatProgress, RunStatus};

/// Bind the control port and serve in a background task.
pub async fn spawn_control_server(state: ControlHandle, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind control port {port}"))?;

    info!(port, "Control server listening on http://localhost:{port}");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Control server error");
        }
    });
    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: ControlHandle) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/status", get(routes::get_status))
        .route("/api/queue", get(routes::get_queue).post(routes::post_queue))
        .route("/api/stop", post(routes::post_stop))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
