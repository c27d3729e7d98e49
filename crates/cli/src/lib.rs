pub mod commands;

use std::error::Error;

use clap::{Args, Parser, Subcommand};
use reqflow_core::config::{LogFormat, LoggingConfig};

#[derive(Debug, Parser)]
#[command(
    name = "reqflow",
    about = "Requisition approval-workflow operator CLI",
    long_about = "Apply migrations, load seed data, inspect configuration, and resolve or repair requisition approval chains.",
    after_help = "Examples:\n  reqflow migrate\n  reqflow resolve --requisition REQ-SEED-001\n  reqflow reresolve --all-pending --force\n  reqflow doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the deterministic organisation and requisition seed dataset")]
    Seed,
    #[command(about = "Resolve the approval chain for one requisition")]
    Resolve(ResolveArgs),
    #[command(about = "Recompute approval chains for several requisitions, one at a time")]
    Reresolve(ReresolveArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, DB connectivity, schema, and workflow readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Clone, Args)]
pub struct ResolveArgs {
    #[arg(long = "requisition", help = "Requisition id to resolve")]
    pub requisition_id: String,
    #[arg(long, help = "Recompute even if a chain is already stored")]
    pub force: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ReresolveArgs {
    #[arg(help = "Requisition ids to recompute", conflicts_with = "all_pending")]
    pub requisition_ids: Vec<String>,
    #[arg(long, help = "Recompute every pending requisition")]
    pub all_pending: bool,
    #[arg(long, default_value_t = 500, help = "Maximum pending requisitions to process")]
    pub limit: u32,
    #[arg(long, help = "Replace stored chains instead of skipping resolved requisitions")]
    pub force: bool,
}

pub fn init_logging(logging: &LoggingConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    use tracing::Level;

    let log_level = logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_max_level(log_level)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
}

pub fn execute(cli: Cli) -> commands::CommandResult {
    match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Resolve(args) => commands::resolve::run(&args),
        Command::Reresolve(args) => commands::reresolve::run(&args),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    }
}
