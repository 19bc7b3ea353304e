//! Mutation errors.

use basket_types::{LineQuery, ProductId};

/// Result type for cart mutations.
pub type Result<T> = std::result::Result<T, CartError>;

/// Failures caused by stale or wrong client-side state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The catalog knows the product but it cannot be purchased.
    #[error("Product is not available for purchase: {0}")]
    ProductUnavailable(ProductId),

    #[error("Item not found in cart: {0}")]
    ItemNotFound(LineQuery),
}
