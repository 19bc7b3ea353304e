//! Cart token transport.
//!
//! Clients present their token in one of three headers, checked in order:
//! `X-Cart-Token`, `Cart-Token`, then `Authorization: Bearer <token>`.
//! The token in use is echoed back in `X-Cart-Token` on every response.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, HeaderValue, request::Parts},
    response::{IntoResponseParts, ResponseParts},
};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Primary request header, and the response header carrying the token.
pub const CART_TOKEN_HEADER: &str = "x-cart-token";

/// Secondary request header.
pub const CART_TOKEN_ALIAS_HEADER: &str = "cart-token";

/// Accepted headers in priority order.
const TOKEN_HEADERS: [&str; 3] = [CART_TOKEN_HEADER, CART_TOKEN_ALIAS_HEADER, "authorization"];

// ─────────────────────────────────────────────────────────────────────────────
// Extraction
// ─────────────────────────────────────────────────────────────────────────────

/// Find the presented cart token, if any.
///
/// A `Bearer` scheme is stripped from any header. Empty and non-ASCII
/// values are skipped so the next header gets a chance.
pub fn extract_cart_token(headers: &HeaderMap) -> Option<String> {
    TOKEN_HEADERS.iter().find_map(|name| {
        let raw = headers.get(*name)?.to_str().ok()?.trim();
        let token = strip_bearer(raw).trim();
        (!token.is_empty()).then(|| token.to_string())
    })
}

/// Strip a case-insensitive `Bearer` scheme followed by whitespace or
/// nothing at all. The value may already have been trimmed.
fn strip_bearer(value: &str) -> &str {
    match (value.get(..6), value.get(6..)) {
        (Some(scheme), Some(rest))
            if scheme.eq_ignore_ascii_case("bearer")
                && (rest.is_empty() || rest.starts_with(char::is_whitespace)) =>
        {
            rest
        }
        _ => value,
    }
}

/// Extractor for the presented cart token. Never rejects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CartToken(pub Option<String>);

impl<S: Send + Sync> FromRequestParts<S> for CartToken {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CartToken(extract_cart_token(&parts.headers)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Echo
// ─────────────────────────────────────────────────────────────────────────────

/// Response part that sets `X-Cart-Token`.
#[derive(Debug, Clone)]
pub struct TokenHeader(pub String);

impl IntoResponseParts for TokenHeader {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if let Ok(value) = HeaderValue::from_str(&self.0) {
            res.headers_mut().insert(CART_TOKEN_HEADER, value);
        }
        Ok(res)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
