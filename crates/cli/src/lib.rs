pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "adsel",
    about = "Advertisement selection operator CLI",
    long_about = "Select advertisements against a catalog, inspect configuration, and run readiness checks.",
    after_help = "Examples:\n  adsel select --customer cust-prime --marketplace M1\n  adsel config\n  adsel doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Select the highest click-through-rate advertisement for a customer")]
    Select(SelectArgs),
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, catalog loading, and a demo selection round trip")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

#[derive(Debug, Clone, Default, Args)]
pub struct SelectArgs {
    #[arg(long, help = "Customer identifier to evaluate targeting predicates against")]
    pub customer: String,
    #[arg(long, help = "Marketplace identifier used to fetch candidate content")]
    pub marketplace: String,
    #[arg(long, help = "Catalog file (.toml or .json); defaults to the built-in demo catalog")]
    pub catalog: Option<PathBuf>,
    #[arg(long, help = "Config file path; defaults to adsel.toml or config/adsel.toml")]
    pub config: Option<PathBuf>,
    #[arg(long, help = "Tie-break rule: first_fetched, last_fetched, or lowest_content_id")]
    pub tie_break: Option<String>,
    #[arg(long, help = "Override the predicate worker pool size")]
    pub workers: Option<usize>,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Select(args) => {
            logging::init_from_env(args.config.as_deref());
            commands::select::run(&args)
        }
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
