//! Store configuration.

use std::time::Duration as StdDuration;

use chrono::Duration;

/// Expiry applied by non-extending saves: 1 hour.
pub const DEFAULT_GRACE_TTL_SECS: i64 = 60 * 60;

/// How long SQLite waits on a locked database before giving up.
pub const DEFAULT_BUSY_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Configuration for [`crate::SqliteCartStore`].
///
/// The sliding TTL is not configured here; it is the token codec's default
/// TTL so issued tokens and stored rows start out with the same expiry.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Expiry used by saves that do not extend the full TTL.
    pub grace_ttl: Duration,

    /// SQLite busy timeout.
    pub busy_timeout: StdDuration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            grace_ttl: Duration::seconds(DEFAULT_GRACE_TTL_SECS),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grace expiry for non-extending saves.
    pub fn with_grace_ttl(mut self, ttl: Duration) -> Self {
        self.grace_ttl = ttl;
        self
    }

    /// Set the SQLite busy timeout.
    pub fn with_busy_timeout(mut self, timeout: StdDuration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}
