//! API routes.

pub mod cart;
pub mod checkout;
pub mod health;

pub use cart::{
    AddItemRequest, CartLineView, CartResponse, LineTarget, add_item_handler, add_one_handler,
    clear_cart_handler, get_cart_handler, remove_item_handler, remove_one_handler,
    update_quantities_handler,
};
pub use checkout::{HandoffResponse, handoff_handler};
pub use health::{HealthResponse, health_routes};
