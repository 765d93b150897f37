//! Health check endpoint for liveness probes.
//!
//! Returns 200 OK while the process is up. Intended for load balancers and
//! orchestration systems (e.g., container platform health checks).

use axum::Json;
use axum::http::StatusCode;
use serde_json::{Value, json};

/// Health check handler.
///
/// Always healthy while the process is serving: the pipeline recovers from
/// its own failures, so "the loop task is alive" is the meaningful signal.
pub async fn health_handler() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "eli5bot",
        })),
    )
}

/// Root handler with basic service identification.
pub async fn root_handler() -> Json<Value> {
    Json(json!({
        "name": "eli5bot",
        "description": "Condescending ELI5 replies for platform mentions",
    }))
}
