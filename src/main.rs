//! Entry point for the `ascript-broker` binary: a standalone process that
//! hosts the session manager behind either a one-shot `run` or the NDJSON
//! `serve` wire protocol.

mod cli;
mod commands;
mod config;
mod observability;

use clap::Parser;
use cli::{Cli, Command};
use config::BrokerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log);
    let config = BrokerConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Run { file, level } => commands::run(&config, file, level).await,
        Command::Serve => commands::serve(&config).await,
    }
}
