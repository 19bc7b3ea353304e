//! Error types for session resolution and cart requests.

use basket_cart::CartError;
use basket_store::StoreError;
use basket_token::TokenError;

/// Error type for session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The cart mutation was rejected (unknown product, missing line).
    #[error(transparent)]
    Cart(#[from] CartError),

    /// The row disappeared between load and save.
    #[error("Cart session is gone: {0}")]
    SessionGone(String),

    /// Strict resolution was asked for but no token was presented.
    #[error("No cart token presented")]
    MissingToken,

    /// Strict resolution rejected the presented token.
    #[error("Invalid cart token: {0}")]
    Token(#[from] TokenError),

    /// Strict resolution found no live row for a valid token.
    #[error("Cart session not found: {0}")]
    NotFound(String),

    /// The store did not answer in time or reported itself unreachable.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Store error: {0}")]
    Store(StoreError),

    /// A blocking task panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl SessionError {
    /// Whether the caller sent something wrong, as opposed to an
    /// infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SessionError::Cart(_)
                | SessionError::SessionGone(_)
                | SessionError::MissingToken
                | SessionError::Token(_)
                | SessionError::NotFound(_)
        )
    }
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => SessionError::StorageUnavailable(msg),
            other => SessionError::Store(other),
        }
    }
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
