//! Vaultsync CLI Binary
//!
//! Command-line interface for reading and writing sharded record content.

use anyhow::Context;
use clap::Parser;
use std::process;
use vaultsync::config::ConfigLoader;
use vaultsync::logging::init_logging;
use vaultsync::tooling::cli::{Cli, CliContext};

fn run(cli: &Cli) -> anyhow::Result<String> {
    let config = ConfigLoader::load(cli.config.as_deref()).context("loading configuration")?;
    init_logging(Some(&cli.logging_overrides(&config.logging)))
        .context("initializing logging")?;
    let context =
        CliContext::with_config(config, cli.offline).context("initializing client")?;
    Ok(context.execute(&cli.command)?)
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(output) => {
            println!("{}", output);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
