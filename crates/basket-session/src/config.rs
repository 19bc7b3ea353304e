//! Configuration for the request pipeline and the reaper.

use std::time::Duration;

/// Default bound on a single store call made for a request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Default reaper cadence: daily.
pub const DEFAULT_REAPER_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default wait before the first reaper run: one hour.
pub const DEFAULT_REAPER_INITIAL_DELAY: Duration = Duration::from_secs(60 * 60);

/// Configuration for [`crate::CartService`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Upper bound on each blocking store call.
    /// Exceeding it fails the request with `StorageUnavailable`.
    pub request_timeout: Duration,

    /// Issue a fresh token after every successful save so the token's `exp`
    /// tracks the row's sliding expiry. Off by default.
    pub rotate_on_save: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            rotate_on_save: false,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-call store timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Enable or disable token rotation on save.
    pub fn with_rotate_on_save(mut self, rotate: bool) -> Self {
        self.rotate_on_save = rotate;
        self
    }
}

/// Configuration for [`crate::ExpiryReaper`].
#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Time between runs.
    pub interval: Duration,

    /// Time before the first run.
    pub initial_delay: Duration,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_REAPER_INTERVAL,
            initial_delay: DEFAULT_REAPER_INITIAL_DELAY,
        }
    }
}

impl ReaperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the run interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the delay before the first run.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}
