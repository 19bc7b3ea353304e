//! Token error types.

/// Result type for token operations.
pub type Result<T> = std::result::Result<T, TokenError>;

/// Why a token could not be produced or accepted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// The token is not three dot-separated segments.
    #[error("malformed token")]
    Malformed,

    /// The signature does not match the header and claims.
    #[error("invalid token signature")]
    BadSignature,

    /// The claims segment is not well-formed or lacks required claims.
    #[error("invalid token payload: {0}")]
    BadPayload(String),

    /// The `exp` claim is at or before the current time.
    #[error("token expired")]
    Expired,

    /// The signing secret is unusable.
    #[error("invalid signing secret: {0}")]
    InvalidSecret(String),

    /// Claims could not be encoded.
    #[error("failed to encode token: {0}")]
    Encode(String),
}

impl TokenError {
    /// Short machine-readable reason, used in logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::BadSignature => "bad_signature",
            TokenError::BadPayload(_) => "bad_payload",
            TokenError::Expired => "expired",
            TokenError::InvalidSecret(_) => "invalid_secret",
            TokenError::Encode(_) => "encode",
        }
    }
}
