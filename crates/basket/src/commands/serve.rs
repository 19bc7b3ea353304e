//! Serve command - runs the cart API server and the expiry reaper.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::info;

use basket_server::{Server, ServerConfig};
use basket_session::{CartService, ExpiryReaper, ReaperConfig, SessionConfig};
use basket_types::Catalog;

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,

    /// SQLite database file (overrides config)
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Do not start the background expiry reaper
    #[arg(long)]
    pub no_reaper: bool,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;
    let config = &loaded.config;

    let codec = super::token_codec(config, true)?;
    let store = Arc::new(super::open_store(config, codec, args.db.as_deref(), ctx)?);
    let catalog = super::load_catalog(config, ctx)?.map(Arc::new);

    // ── Server settings ─────────────────────────────────────────────────

    let server_section = config.server();
    let port = args.port.unwrap_or(server_section.port);
    let bind = args.bind.unwrap_or(server_section.bind);
    let addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    let session_config = SessionConfig::new()
        .with_request_timeout(config.store().request_timeout())
        .with_rotate_on_save(config.token().rotate_on_save);
    let server_config = ServerConfig::new()
        .with_bind_address(addr)
        .with_request_logging(server_section.request_logging)
        .with_max_body_size(server_section.max_body_size);

    let service = CartService::new(
        store.clone(),
        catalog.clone().unwrap_or_default(),
        session_config,
    );

    // ── Reaper ──────────────────────────────────────────────────────────

    let shutdown = CancellationToken::new();
    let reaper_section = config.reaper();
    let reaper_handle = if reaper_section.enabled && !args.no_reaper {
        let reaper_config = ReaperConfig::new()
            .with_interval(reaper_section.interval())
            .with_initial_delay(reaper_section.initial_delay());
        let catalog = catalog.map(|c| c as Arc<dyn Catalog>);
        Some(ExpiryReaper::new(store, catalog, reaper_config).spawn(shutdown.clone()))
    } else {
        info!("Expiry reaper disabled");
        None
    };

    // ── Run ─────────────────────────────────────────────────────────────

    if ctx.verbose {
        eprintln!("Listening on http://{}", addr);
    }

    let signal = {
        let shutdown = shutdown.clone();
        async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            shutdown.cancel();
        }
    };

    let result = Server::new(service, server_config)
        .run_with_shutdown(signal)
        .await;

    shutdown.cancel();
    if let Some(handle) = reaper_handle {
        let _ = handle.await;
    }

    result?;
    Ok(())
}
