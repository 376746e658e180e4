//! HTTP surface: export, response-log query, labeling and cost estimate endpoints.

mod error;
mod estimate;
mod export;
mod label;
mod logs;

pub use error::ApiError;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use framelabel_core::FrameLabel;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub app: Arc<FrameLabel>,
}

/// Build the router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/export", post(export::export))
        .route("/api/logs", get(logs::query).delete(logs::reset))
        .route("/api/label", post(label::label))
        .route("/api/estimate", get(estimate::estimate))
        .with_state(state)
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until the process is stopped.
pub async fn start_server(app: FrameLabel, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::new(host.parse()?, port);
    let router = create_router(AppState { app: Arc::new(app) });

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{addr}");
    axum::serve(listener, router).await?;
    Ok(())
}
