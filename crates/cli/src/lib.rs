pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "leadsync",
    about = "amoCRM synchronization operator CLI",
    long_about = "Operate the amoCRM synchronization engine: migrations, one-shot and \
                  scheduled sync runs, run history, stage mapping, and config inspection.",
    after_help = "Examples:\n  leadsync migrate\n  leadsync sync\n  leadsync map-stage 142 IN_PROGRESS\n  leadsync logs --limit 5"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Run one full reconciliation against the connected amoCRM account")]
    Sync {
        #[arg(long, help = "Record the run as SCHEDULED instead of MANUAL")]
        scheduled: bool,
    },
    #[command(about = "Run the fixed-interval sync loop until interrupted")]
    Schedule,
    #[command(about = "Show recent sync runs, newest first")]
    Logs {
        #[arg(long, default_value_t = 20, help = "Maximum number of runs to show")]
        limit: u32,
    },
    #[command(
        name = "map-stage",
        about = "Map a pipeline stage to a local lead status (NEW, IN_PROGRESS, CLOSED, or NONE to clear)"
    )]
    MapStage {
        stage_id: i64,
        status: String,
    },
    #[command(about = "Inspect effective configuration values with source attribution and redaction")]
    Config,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Sync { scheduled } => commands::sync::run(scheduled),
        Command::Schedule => commands::schedule::run(),
        Command::Logs { limit } => {
            commands::CommandResult { exit_code: 0, output: commands::logs::run(limit) }
        }
        Command::MapStage { stage_id, status } => commands::map_stage::run(stage_id, &status),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
