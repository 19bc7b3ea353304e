//! Cart mutation engine.
//!
//! Every operation takes the current [`CartPayload`] by reference and returns
//! a new payload together with an [`Outcome`]. Nothing is persisted here; the
//! caller saves the returned payload in one write, so an aborted request
//! never leaves a half-applied mutation behind.
//!
//! Product existence and pricing come from a [`Catalog`]; quantity and line
//! identity rules live here:
//!
//! - adding a product that already has a line sums into that line
//! - non-positive requested quantities are coerced to 1
//! - a line never reaches quantity 0; decrementing at 1 removes it

mod engine;
mod error;

pub use engine::{AddItem, CartMutationEngine, Mutation, Outcome};
pub use error::{CartError, Result};

pub use basket_types::{CartPayload, Catalog, LineQuery, ProductId};
