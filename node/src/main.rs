// concord/node/src/main.rs

//! The main entry point for the Concord node executable.

mod config;
mod runner;

use anyhow::Result;
use clap::Parser;
use config::Config;
use runner::Node;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "concord-node", version, about = "Replicated ledger node")]
struct Cli {
    /// Path to the node configuration file
    #[arg(short, long, default_value = "config/node.toml")]
    config: PathBuf,

    /// Log filter, e.g. `info` or `concord_p2p=debug`; overrides RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    let config = Config::load(&cli.config)?;
    Node::new(config)?.run().await
}
