//! Token command - issue and inspect cart tokens.
//!
//! Intended for support and debugging: minting a token for a known cart
//! key, or checking why a client's token is being rejected.

use anyhow::Result;
use clap::{Args, Subcommand};

use super::Context;

/// Arguments for the token command.
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Sign a token for a cart key
    Issue {
        /// Cart key to embed
        cart_key: String,

        /// Lifetime in seconds (default: [token].ttl_secs)
        #[arg(long)]
        ttl_secs: Option<u32>,
    },

    /// Verify a token and print its claims
    Verify {
        /// Token to check
        token: String,
    },
}

/// Run the token command.
pub async fn run(args: TokenArgs, ctx: &Context) -> Result<()> {
    let loaded = super::load_config(ctx)?;
    let codec = super::token_codec(&loaded.config, false)?;

    match args.command {
        TokenCommand::Issue { cart_key, ttl_secs } => {
            let ttl = ttl_secs
                .map(|secs| chrono::Duration::seconds(i64::from(secs)))
                .unwrap_or_else(|| codec.default_ttl());
            let token = codec.issue(&cart_key, ttl)?;
            println!("{}", token);
        }
        TokenCommand::Verify { token } => match codec.verify(&token) {
            Ok(claims) => {
                if ctx.json_output {
                    println!("{}", serde_json::to_string_pretty(&claims)?);
                } else {
                    println!("cart_key: {}", claims.cart_key);
                    println!("issuer:   {}", claims.iss);
                    if let Some(issued) = claims.issued_at() {
                        println!("issued:   {}", issued.to_rfc3339());
                    }
                    if let Some(expires) = claims.expires_at() {
                        println!("expires:  {}", expires.to_rfc3339());
                    }
                }
            }
            Err(e) => anyhow::bail!("Token rejected ({}): {}", e.reason(), e),
        },
    }

    Ok(())
}
