//! Checkout handoff.
//!
//! The checkout flow takes ownership of the cart: the row is consumed and
//! the token stops working. Unlike the cart endpoints this never creates a
//! session, so a bad token is an error rather than a fresh empty cart.

use axum::{Json, extract::State};
use basket_types::LineItem;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;
use crate::token::CartToken;

/// The consumed cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandoffResponse {
    pub cart_key: String,
    pub items_count: u64,
    pub items: Vec<LineItem>,
}

/// POST /api/v1/checkout/handoff - Consume the cart for checkout.
pub async fn handoff_handler(
    State(state): State<AppState>,
    CartToken(token): CartToken,
) -> Result<Json<HandoffResponse>> {
    let handoff = state.service.handoff(token).await?;

    Ok(Json(HandoffResponse {
        cart_key: handoff.cart_key,
        items_count: handoff.payload.total_quantity(),
        items: handoff.payload.lines().to_vec(),
    }))
}
