//! Configuration system for basket.
//!
//! Provides TOML-based configuration with:
//! - `[server]`, `[token]`, `[store]`, `[reaper]` and `[catalog]` sections
//! - Config file layering (user config dir + project-local overrides)
//! - Token secret resolution (env var → config file)

pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options, user_config_dir,
    user_config_path,
};
pub use error::{ConfigError, Result};
pub use secrets::{ResolvedSecret, SecretSource, TOKEN_SECRET_ENV, resolve_token_secret};
pub use types::*;
