//! Token codec configuration.

use std::fmt;

use chrono::Duration;

/// Default signing TTL: 48 hours.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 48 * 60 * 60;

/// Immutable signing configuration handed to [`crate::TokenCodec`].
#[derive(Clone)]
pub struct TokenConfig {
    /// HMAC secret.
    pub secret: Vec<u8>,

    /// Value written to the `iss` claim.
    pub issuer: String,

    /// TTL used when callers ask for the default.
    pub ttl: Duration,
}

impl TokenConfig {
    /// Create a config with the default 48 hour TTL.
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            issuer: issuer.into(),
            ttl: Duration::seconds(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// Set the default TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish()
    }
}
