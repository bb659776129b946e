//! Sprig CLI Binary
//!
//! Command-line interface for the Sprig file-browser engine.

use anyhow::Context;
use clap::Parser;
use sprig::logging::init_logging;
use sprig::tooling::cli::{Cli, CliContext};
use std::process;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.load_config().context("loading configuration")?;

    if let Err(e) = init_logging(Some(&config.logging), Some(cli.workspace.as_path())) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let context = CliContext::with_config(cli.workspace.clone(), config)
        .context("opening workspace")?;
    let output = context.execute(&cli.command)?;
    print!("{}", output);
    if !output.ends_with('\n') {
        println!();
    }
    Ok(())
}
