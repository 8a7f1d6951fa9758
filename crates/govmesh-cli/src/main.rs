//! govmesh operator CLI
//!
//! Evaluates governance frameworks against credential holdings and runs the
//! relay protocol over simulated networks.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;

use commands::{
    evaluate::{self, EvaluateArgs},
    simulate::{self, SimulateArgs},
};

#[derive(Parser)]
#[command(name = "govmesh")]
#[command(about = "govmesh - governance-aware trust network tooling", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = ".govmesh/config.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the roles a framework grants a set of credential holdings
    Evaluate(EvaluateArgs),

    /// Run a trace, gossip or compliance exchange over an in-memory network
    Simulate(SimulateArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    // Logs go to stderr; stdout carries command output
    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log.level.as_str()
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Evaluate(args) => {
            evaluate::run(args).await?;
        }

        Commands::Simulate(args) => {
            simulate::run(args, &config.node, config.relay.clone()).await?;
        }
    }

    Ok(())
}
