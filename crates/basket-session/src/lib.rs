//! Cart session resolution and the request pipeline built on it.
//!
//! - [`SessionResolver`] turns an optional inbound token into an
//!   authoritative session, creating a fresh one whenever the token or its
//!   row is unusable.
//! - [`CartService`] runs resolve, mutate and save for one request, with every
//!   store call on the blocking pool under a timeout.
//! - [`ExpiryReaper`] periodically deletes expired rows and prunes lines whose
//!   products have disappeared.
//!
//! # Example
//!
//! ```rust,ignore
//! use basket_session::{CartOperation, CartService, SessionConfig};
//!
//! let service = CartService::new(store, catalog, SessionConfig::default());
//! let resolved = service.resolve(inbound_token).await?;
//! let state = service
//!     .apply(&resolved, CartOperation::Add(AddItem::new(42, 2)))
//!     .await?;
//! // Echo state.token back to the client.
//! ```

mod config;
mod error;
mod reaper;
mod resolver;
mod service;

pub use config::{
    DEFAULT_REAPER_INITIAL_DELAY, DEFAULT_REAPER_INTERVAL, DEFAULT_REQUEST_TIMEOUT, ReaperConfig,
    SessionConfig,
};
pub use error::{Result, SessionError};
pub use reaper::ExpiryReaper;
pub use resolver::{ResolvedSession, SessionOrigin, SessionResolver};
pub use service::{CartOperation, CartService, CartState, Handoff};
