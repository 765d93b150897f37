//! The HTTP surface: a health endpoint beside the worker loops.

pub mod health;

use std::net::SocketAddr;

use axum::{Router, routing::get};
use tracing::info;

use self::health::{health_handler, root_handler};

/// Builds the service router.
pub fn router() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Serves the health endpoints until the task is cancelled.
pub async fn serve(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("health server listening on {addr}");
    axum::serve(listener, router()).await
}
