//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [server]    # HTTP listener
//! [token]     # signing secret, issuer, TTL
//! [store]     # SQLite path and timeouts
//! [reaper]    # cleanup cadence
//! [catalog]   # bundled product list
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

/// Default HTTP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default bind address.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default request body limit (64 KiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 64 * 1024;

/// Default token TTL in seconds (48 hours).
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 48 * 60 * 60;

/// Default database filename, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "basket.db";

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g., project-local
/// overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasketConfig {
    /// HTTP server configuration.
    pub server: Option<ServerSection>,

    /// Token signing configuration.
    pub token: Option<TokenSection>,

    /// Cart-session store configuration.
    pub store: Option<StoreSection>,

    /// Expiry reaper configuration.
    pub reaper: Option<ReaperSection>,

    /// Bundled catalog configuration.
    pub catalog: Option<CatalogSection>,
}

impl BasketConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: BasketConfig = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: BasketConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }

        if other.token.is_some() {
            self.token = other.token;
        }

        if other.store.is_some() {
            self.store = other.store;
        }

        if other.reaper.is_some() {
            self.reaper = other.reaper;
        }

        if other.catalog.is_some() {
            self.catalog = other.catalog;
        }
    }

    /// Server section, or defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Token section, or defaults.
    pub fn token(&self) -> TokenSection {
        self.token.clone().unwrap_or_default()
    }

    /// Store section, or defaults.
    pub fn store(&self) -> StoreSection {
        self.store.clone().unwrap_or_default()
    }

    /// Reaper section, or defaults.
    pub fn reaper(&self) -> ReaperSection {
        self.reaper.clone().unwrap_or_default()
    }

    /// Catalog file, if configured.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.catalog.as_ref().and_then(|c| c.path.clone())
    }

    /// Reject values that parse but cannot work.
    pub fn validate(&self) -> Result<()> {
        if let Some(token) = &self.token {
            check_duration("token.ttl_secs", token.ttl_secs)?;
        }

        if let Some(reaper) = &self.reaper {
            check_duration("reaper.interval_secs", reaper.interval_secs)?;
            check_upper_bound("reaper.initial_delay_secs", reaper.initial_delay_secs)?;
        }

        if let Some(store) = &self.store {
            check_upper_bound("store.grace_ttl_secs", store.grace_ttl_secs)?;
            if store.request_timeout_ms == 0 {
                return Err(invalid("store.request_timeout_ms", "must be greater than zero"));
            }
        }

        Ok(())
    }
}

/// Longest accepted TTL or interval: ten years.
pub const MAX_DURATION_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn check_duration(field: &str, secs: u64) -> Result<()> {
    if secs == 0 {
        return Err(invalid(field, "must be greater than zero"));
    }
    check_upper_bound(field, secs)
}

fn check_upper_bound(field: &str, secs: u64) -> Result<()> {
    if secs > MAX_DURATION_SECS {
        return Err(invalid(
            field,
            &format!("must be at most {} seconds (ten years)", MAX_DURATION_SECS),
        ));
    }
    Ok(())
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    /// Address to bind to.
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable request logging.
    pub request_logging: bool,
    /// Maximum accepted request body in bytes.
    pub max_body_size: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            port: DEFAULT_PORT,
            request_logging: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Token Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Token signing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSection {
    /// HMAC secret. Prefer the `BASKET_TOKEN_SECRET` env var.
    pub secret: Option<String>,
    /// Value of the `iss` claim.
    pub issuer: String,
    /// Token and session TTL in seconds.
    pub ttl_secs: u64,
    /// Issue a fresh token on every save.
    pub rotate_on_save: bool,
}

impl Default for TokenSection {
    fn default() -> Self {
        Self {
            secret: None,
            issuer: format!("http://localhost:{}", DEFAULT_PORT),
            ttl_secs: DEFAULT_TOKEN_TTL_SECS,
            rotate_on_save: false,
        }
    }
}

impl TokenSection {
    /// Whether a plaintext secret is stored in the config file.
    pub fn has_plaintext_secret(&self) -> bool {
        self.secret.as_deref().is_some_and(|s| !s.is_empty())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Store Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Cart-session store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// SQLite database file.
    pub path: PathBuf,
    /// SQLite busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
    /// Bound on each store call made for a request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Expiry of non-extending saves, in seconds.
    pub grace_ttl_secs: u64,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_FILE),
            busy_timeout_ms: 5_000,
            request_timeout_ms: 3_000,
            grace_ttl_secs: 3_600,
        }
    }
}

impl StoreSection {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reaper Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Expiry reaper configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaperSection {
    /// Run the reaper inside `basket serve`.
    pub enabled: bool,
    /// Seconds between runs.
    pub interval_secs: u64,
    /// Seconds before the first run.
    pub initial_delay_secs: u64,
}

impl Default for ReaperSection {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 24 * 60 * 60,
            initial_delay_secs: 60 * 60,
        }
    }
}

impl ReaperSection {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Catalog Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Bundled in-memory catalog configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSection {
    /// JSON file holding an array of products.
    pub path: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = BasketConfig::from_toml("").unwrap();
        assert_eq!(config, BasketConfig::default());
        assert_eq!(config.server().port, DEFAULT_PORT);
        assert_eq!(config.token().ttl_secs, 172_800);
        assert!(!config.token().rotate_on_save);
        assert_eq!(config.store().path, PathBuf::from("basket.db"));
        assert_eq!(config.reaper().interval(), Duration::from_secs(86_400));
        assert_eq!(config.reaper().initial_delay(), Duration::from_secs(3_600));
        assert!(config.catalog_path().is_none());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[server]
bind = "0.0.0.0"
port = 9000
request_logging = false
max_body_size = 1024

[token]
issuer = "https://shop.example"
ttl_secs = 3600
rotate_on_save = true

[store]
path = "/var/lib/basket/carts.db"
busy_timeout_ms = 250
request_timeout_ms = 1500
grace_ttl_secs = 600

[reaper]
enabled = false
interval_secs = 60
initial_delay_secs = 5

[catalog]
path = "products.json"
"#;
        let config = BasketConfig::from_toml(toml).unwrap();

        let server = config.server();
        assert_eq!(server.bind, "0.0.0.0");
        assert_eq!(server.port, 9000);
        assert!(!server.request_logging);
        assert_eq!(server.max_body_size, 1024);

        let token = config.token();
        assert_eq!(token.issuer, "https://shop.example");
        assert_eq!(token.ttl_secs, 3600);
        assert!(token.rotate_on_save);
        assert!(!token.has_plaintext_secret());

        let store = config.store();
        assert_eq!(store.busy_timeout(), Duration::from_millis(250));
        assert_eq!(store.request_timeout(), Duration::from_millis(1500));
        assert_eq!(store.grace_ttl_secs, 600);

        assert!(!config.reaper().enabled);
        assert_eq!(config.catalog_path(), Some(PathBuf::from("products.json")));
    }

    #[test]
    fn test_partial_section_uses_defaults() {
        let config = BasketConfig::from_toml("[server]\nport = 3000\n").unwrap();
        let server = config.server();
        assert_eq!(server.port, 3000);
        assert_eq!(server.bind, DEFAULT_BIND);
        assert_eq!(server.max_body_size, DEFAULT_MAX_BODY_SIZE);
    }

    #[test]
    fn test_merge_overrides_sections() {
        let mut base = BasketConfig::from_toml("[server]\nport = 3000\n[token]\nttl_secs = 10\n").unwrap();
        let overlay = BasketConfig::from_toml("[server]\nport = 4000\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.server().port, 4000);
        assert_eq!(base.token().ttl_secs, 10);
    }

    #[test]
    fn test_zero_values_rejected() {
        let err = BasketConfig::from_toml("[token]\nttl_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "token.ttl_secs"));

        let err = BasketConfig::from_toml("[reaper]\ninterval_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_oversized_durations_rejected() {
        for (text, expected) in [
            ("[token]\nttl_secs = 1000000000000000\n", "token.ttl_secs"),
            ("[store]\ngrace_ttl_secs = 1000000000000000\n", "store.grace_ttl_secs"),
            ("[reaper]\ninterval_secs = 1000000000000000\n", "reaper.interval_secs"),
            ("[reaper]\ninitial_delay_secs = 1000000000000000\n", "reaper.initial_delay_secs"),
        ] {
            let err = BasketConfig::from_toml(text).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue { ref field, .. } if field == expected),
                "{text}: {err}"
            );
        }

        let at_limit = format!("[token]\nttl_secs = {}\n", MAX_DURATION_SECS);
        assert!(BasketConfig::from_toml(&at_limit).is_ok());
    }

    #[test]
    fn test_plaintext_secret_detection() {
        let config = BasketConfig::from_toml("[token]\nsecret = \"hunter2\"\n").unwrap();
        assert!(config.token().has_plaintext_secret());
    }

    #[test]
    fn test_roundtrip_toml() {
        let config = BasketConfig {
            server: Some(ServerSection::default()),
            reaper: Some(ReaperSection {
                enabled: false,
                ..Default::default()
            }),
            ..Default::default()
        };
        let text = config.to_toml().unwrap();
        assert_eq!(BasketConfig::from_toml(&text).unwrap(), config);
    }
}
