//! Config command - inspect the effective configuration.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print the merged configuration as TOML
    Show,

    /// Print the config files that were considered
    Which,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Which => cmd_which(ctx),
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let mut config = super::load_config(ctx)?.config;

    if let Some(token) = config.token.as_mut()
        && token.secret.is_some()
    {
        token.secret = Some("<redacted>".to_string());
    }

    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;
    for source in &loaded.sources {
        let status = if source.loaded { "loaded" } else { "not found" };
        println!("{} ({})", source.path.display(), status);
    }
    Ok(())
}
