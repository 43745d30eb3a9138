pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "upkeep",
    about = "Upkeep service agreement operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness, \
                  and price saved agreement forms.",
    after_help = "Examples:\n  upkeep doctor --json\n  upkeep config\n  \
                  upkeep price --state form.json --agreement SA-100.json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, timezone, templates, email and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Print the agreement summary for a saved form state")]
    Price {
        #[arg(long, help = "Path to a form state JSON file")]
        state: PathBuf,
        #[arg(long, help = "Agreement JSON to take sites and prices from")]
        agreement: Option<PathBuf>,
        #[arg(long, help = "Currency code for the summary (defaults to agreement.currency)")]
        currency: Option<String>,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Price { state, agreement, currency } => {
            commands::price::run(&state, agreement.as_deref(), currency.as_deref())
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
