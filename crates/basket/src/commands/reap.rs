//! Reap command - one cleanup pass, for cron-driven deployments.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use basket_store::CartSessionStore;
use basket_types::Catalog;

use super::Context;

/// Arguments for the reap command.
#[derive(Args, Debug)]
pub struct ReapArgs {
    /// SQLite database file (overrides config)
    #[arg(long)]
    pub db: Option<PathBuf>,
}

/// Run the reap command.
pub async fn run(args: ReapArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;
    let config = &loaded.config;

    // Cleanup never verifies tokens, so a missing secret is harmless here.
    let codec = super::token_codec(config, true)?;
    let store = super::open_store(config, codec, args.db.as_deref(), ctx)?;
    let catalog = super::load_catalog(config, ctx)?;

    let report = tokio::task::spawn_blocking(move || {
        store.cleanup(catalog.as_ref().map(|c| c as &dyn Catalog))
    })
    .await??;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.is_noop() {
        println!("Nothing to clean");
    } else {
        println!("Expired sessions removed: {}", report.expired_count);
        println!("Corrupt sessions removed: {}", report.corrupt_count);
        println!("Dangling items pruned:    {}", report.pruned_item_count);
    }

    Ok(())
}
