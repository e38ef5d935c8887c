//! Command handlers behind the CLI subcommands.
//!
//! Each handler takes a connected [`Client`] plus its parsed arguments
//! and performs one operation end to end, printing results to stdout.

pub mod kv;
pub mod run_once;
pub mod service;

use crate::api::Client;
use crate::cli::{Cli, Commands};
use crate::error::Result;

/// Dispatches a parsed command line to its handler.
pub async fn dispatch(client: &Client, cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Kv(subcmd) => kv::dispatch(client, subcmd).await,
        Commands::Register(args) => service::register(client, args).await,
        Commands::Deregister(args) => service::deregister(client, args).await,
        Commands::RunOnce(args) => run_once::run(client, args).await,
    }
}
