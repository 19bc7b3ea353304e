//! Cart-session storage.
//!
//! One row per cart: an opaque `cart_key`, the serialized payload, and an
//! absolute expiry that slides forward on every save. Rows at or past their
//! expiry are invisible to reads; only [`CartSessionStore::cleanup`] deletes
//! them.
//!
//! - [`store`]: the [`CartSessionStore`] trait and row types
//! - [`sqlite`]: SQLite implementation with embedded migrations
//! - [`payload`]: payload normalization at the storage boundary

mod config;
mod error;
pub mod payload;
pub mod sqlite;
pub mod store;

pub use config::{DEFAULT_BUSY_TIMEOUT, DEFAULT_GRACE_TTL_SECS, StoreConfig};
pub use error::{Result, StoreError};
pub use payload::{PayloadError, decode_payload, encode_payload};
pub use sqlite::SqliteCartStore;
pub use store::{CartSession, CartSessionStore, CleanupReport, IssuedSession};
