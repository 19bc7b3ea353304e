//! The cart-session store contract.

use basket_token::TokenCodec;
use basket_types::{CartPayload, Catalog};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A live cart-session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSession {
    pub cart_key: String,
    pub payload: CartPayload,
    pub expiry: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartSession {
    /// Whether the row is past its expiry at `now` (expiry is exclusive).
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expiry <= now
    }
}

/// A freshly created session together with the token issued for it.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    pub session: CartSession,
    pub token: String,
}

/// Counts from one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    /// Rows deleted because their expiry had passed.
    pub expired_count: usize,
    /// Rows deleted because their payload could not be decoded.
    pub corrupt_count: usize,
    /// Line items removed because their product no longer resolves.
    pub pruned_item_count: usize,
}

impl CleanupReport {
    /// Rows deleted for any reason.
    pub fn deleted_rows(&self) -> usize {
        self.expired_count + self.corrupt_count
    }

    pub fn is_noop(&self) -> bool {
        self.deleted_rows() == 0 && self.pruned_item_count == 0
    }
}

/// Sole source of truth for cart payload durability.
///
/// Calls block on the backing store; async callers run them on the blocking
/// pool. Every method is a single atomic write or read of one row, except
/// `cleanup`, which touches each row independently.
pub trait CartSessionStore: Send + Sync {
    /// Codec used to issue tokens for new sessions.
    fn codec(&self) -> &TokenCodec;

    /// Full sliding TTL applied on creation and on extending saves.
    fn default_ttl(&self) -> Duration {
        self.codec().default_ttl()
    }

    /// Create an empty session with the default TTL and issue its token.
    fn create(&self) -> Result<IssuedSession> {
        self.create_with_ttl(self.default_ttl())
    }

    /// Check that the backing store answers a trivial query.
    fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Create an empty session expiring `ttl` from now and issue its token.
    fn create_with_ttl(&self, ttl: Duration) -> Result<IssuedSession>;

    /// Load a live session. Absent and expired rows are both `NotFound`.
    fn load(&self, cart_key: &str) -> Result<CartSession>;

    /// Overwrite the payload of a live session and move its expiry.
    ///
    /// With `extend_ttl` the expiry becomes now + the full TTL, otherwise
    /// now + the short grace TTL. Returns the new expiry. Fails with
    /// `NotFound` if the row is gone or already expired.
    fn save(&self, cart_key: &str, payload: &CartPayload, extend_ttl: bool)
    -> Result<DateTime<Utc>>;

    /// Delete a session. Deleting a missing key is not an error.
    fn delete(&self, cart_key: &str) -> Result<()>;

    /// Delete expired and corrupt rows and prune lines whose product no
    /// longer resolves in `catalog`. Without a catalog no lines are pruned.
    fn cleanup(&self, catalog: Option<&dyn Catalog>) -> Result<CleanupReport>;
}
