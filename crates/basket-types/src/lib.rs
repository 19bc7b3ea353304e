//! Shared types for the basket cart-session system.
//!
//! - [`cart`]: line items, the ordered cart payload, and line lookups
//! - [`catalog`]: the product catalog boundary consumed by the cart engine
//!   and the expiry reaper

pub mod cart;
pub mod catalog;

pub use cart::{CartPayload, LineItem, LineQuery, ProductId, derive_line_key};
pub use catalog::{Catalog, CatalogError, InMemoryCatalog, ProductSnapshot};
