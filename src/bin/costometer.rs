//! costometer CLI - Infer planning costs from participant traces
//!
//! This CLI provides:
//! - Grid inference of cost and temperature parameters for a set of traces
//! - Model comparison by BIC over an experiment's result bundles

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "costometer")]
#[command(version, about = "Inverse reinforcement learning of planning costs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit cost and policy parameters by exhaustive grid search
    Infer(costometer::cli::commands::infer::InferArgs),

    /// Rank an experiment's models by summed BIC
    Compare(costometer::cli::commands::compare::CompareArgs),
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Infer(args) => costometer::cli::commands::infer::execute(args),
        Commands::Compare(args) => costometer::cli::commands::compare::execute(args),
    }
}
