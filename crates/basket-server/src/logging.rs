//! Request logging middleware.

use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::state::AppState;
use crate::token::{CART_TOKEN_HEADER, extract_cart_token};

/// Structured per-request log line.
///
/// Records method, path, status and duration, plus whether the client
/// presented a token and whether the response handed it a different one.
/// Token values are never logged.
pub async fn request_logging_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.config.request_logging {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let presented = extract_cart_token(request.headers());

    let start = Instant::now();
    let response = next.run(request).await;
    let duration_ms = start.elapsed().as_millis();

    let status = response.status();
    let echoed = response
        .headers()
        .get(CART_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    let token_presented = presented.is_some();
    let token_replaced = echoed.is_some() && echoed != presented.as_deref();

    if status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            token_presented,
            token_replaced,
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            token_presented,
            token_replaced,
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            method = %method,
            path = %path,
            status = status.as_u16(),
            duration_ms = %duration_ms,
            token_presented,
            token_replaced,
            "Request completed"
        );
    }

    response
}
