//! ctxpack - Pack a source tree into one token-bounded text document
//!
//! ctxpack provides:
//! - git-aware file discovery with glob include/exclude rules
//! - Parallel reading with binary, size, and encoding checks
//! - Per-file token limits with head+tail truncation
//! - A single aggregate token count checked against a hard cap

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backends;
mod cli;
mod core;
mod flows;

fn init_logging(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    cli::run(cli)
}
