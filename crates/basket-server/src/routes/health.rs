//! Liveness and readiness endpoints.
//!
//! Neither route resolves a cart token, so polling them never creates a
//! session or echoes a token header.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok`, or `unavailable` when the cart store does not answer.
    pub status: String,
    pub version: String,
}

impl HealthResponse {
    fn with_status(status: &str) -> Self {
        Self {
            status: status.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The process is up. The cart store is not consulted.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::with_status("ok"))
}

/// The cart store answers a trivial query. 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    match state.service.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::with_status("ok"))),
        Err(e) => {
            warn!(error = %e, "Cart store failed readiness check");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::with_status("unavailable")),
            )
        }
    }
}

pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
}
