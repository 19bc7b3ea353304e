//! CLI command handlers.

pub mod config;
pub mod reap;
pub mod serve;
pub mod token;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use basket_config::{BasketConfig, LoadedConfig, TOKEN_SECRET_ENV};
use basket_store::{SqliteCartStore, StoreConfig};
use basket_token::{TokenCodec, TokenConfig};
use basket_types::InMemoryCatalog;
use rand::{Rng, distr::Alphanumeric};
use tracing::{debug, info, warn};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// User config directory; also holds logs and relative store paths.
    pub config_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Resolve `path` against the config directory when it is relative.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.config_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Load layered configuration and surface its warnings.
pub fn load_config(ctx: &Context) -> Result<LoadedConfig> {
    let loaded = basket_config::load_config_with_options(None, ctx.config_dir.as_deref())?;

    for warning in &loaded.warnings {
        eprintln!("warning: {}", warning);
    }

    if ctx.verbose {
        let sources = loaded.loaded_from();
        if sources.is_empty() {
            eprintln!("No config files found, using defaults + CLI args");
        } else {
            for source in sources {
                eprintln!("Loaded config: {}", source.display());
            }
        }
    }

    Ok(loaded)
}

/// Build the token codec from `[token]` and the secret resolution chain.
///
/// With `allow_ephemeral`, a missing secret is replaced by a random one that
/// lives as long as the process.
pub fn token_codec(config: &BasketConfig, allow_ephemeral: bool) -> Result<TokenCodec> {
    let section = config.token();

    let secret = match basket_config::resolve_token_secret(section.secret.as_deref()) {
        Some(resolved) => {
            debug!(source = %resolved.source, "Resolved token secret");
            resolved.value
        }
        None if allow_ephemeral => {
            warn!(
                "No token secret configured; using an ephemeral secret. \
                 Issued tokens stop working when the process exits."
            );
            ephemeral_secret()
        }
        None => anyhow::bail!(
            "No token secret configured. Set {} or [token].secret.",
            TOKEN_SECRET_ENV
        ),
    };

    let ttl_secs = i64::try_from(section.ttl_secs).context("[token].ttl_secs is too large")?;
    let codec = TokenCodec::new(
        TokenConfig::new(secret, section.issuer).with_ttl(chrono::Duration::seconds(ttl_secs)),
    )?;
    Ok(codec)
}

/// Open the SQLite cart store named by `[store]`, or `path_override`.
pub fn open_store(
    config: &BasketConfig,
    codec: TokenCodec,
    path_override: Option<&Path>,
    ctx: &Context,
) -> Result<SqliteCartStore> {
    let section = config.store();
    let path = ctx.resolve_path(path_override.unwrap_or(section.path.as_path()));

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let grace_secs = i64::try_from(section.grace_ttl_secs).context("[store].grace_ttl_secs is too large")?;
    let store_config = StoreConfig::default()
        .with_grace_ttl(chrono::Duration::seconds(grace_secs))
        .with_busy_timeout(section.busy_timeout());

    let store = SqliteCartStore::open(&path, codec, store_config)
        .with_context(|| format!("Failed to open cart store at {}", path.display()))?;
    info!(path = %path.display(), "Opened cart store");
    Ok(store)
}

/// Load the product catalog named by `[catalog].path`.
///
/// `None` when no path is configured. Callers then serve with an empty
/// catalog and skip pruning so stored lines are never dropped.
pub fn load_catalog(config: &BasketConfig, ctx: &Context) -> Result<Option<InMemoryCatalog>> {
    match config.catalog_path() {
        Some(path) => {
            let path = ctx.resolve_path(&path);
            let catalog = InMemoryCatalog::from_json_file(&path)?;
            info!(path = %path.display(), products = catalog.len(), "Loaded catalog");
            Ok(Some(catalog))
        }
        None => {
            warn!("No [catalog].path configured; adds will fail and pruning is skipped");
            Ok(None)
        }
    }
}

fn ephemeral_secret() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}
