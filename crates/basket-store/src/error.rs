//! Storage error types.

use rusqlite::ErrorCode;

use crate::payload::PayloadError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No live row for this key (absent, deleted, or expired).
    #[error("Cart session not found: {0}")]
    NotFound(String),

    /// Two consecutive generated keys collided on insert.
    #[error("Cart key collision after retry")]
    KeyCollision,

    /// The backing store could not serve the request in time.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// The stored payload cannot be decoded.
    #[error("Corrupt payload for cart {cart_key}: {source}")]
    CorruptPayload {
        cart_key: String,
        source: PayloadError,
    },

    /// The requested TTL pushes the expiry past the representable range.
    #[error("Cart TTL out of range: {0} seconds")]
    ExpiryOutOfRange(i64),

    #[error("Database error: {0}")]
    Database(rusqlite::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] basket_token::TokenError),
}

impl StoreError {
    /// Whether this error means the store itself is unreachable or saturated.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(
                ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::CannotOpen
                | ErrorCode::SystemIoFailure
                | ErrorCode::DiskFull,
            ) => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Database(e),
        }
    }
}
