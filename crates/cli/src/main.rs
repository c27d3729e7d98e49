use std::process::ExitCode;

use anyhow::anyhow;
use clap::Parser;
use reqflow_cli::{execute, init_logging, Cli};
use reqflow_core::config::{AppConfig, LoadOptions};

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Commands report their own config errors, so logging falls back to defaults here.
    let logging = AppConfig::load(LoadOptions::default()).unwrap_or_default().logging;
    init_logging(&logging).map_err(|error| anyhow!("failed to initialise logging: {error}"))?;

    let result = execute(cli);
    println!("{}", result.output);
    Ok(ExitCode::from(result.exit_code))
}
