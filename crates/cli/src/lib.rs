pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "askbridge",
    about = "Askbridge operator CLI",
    long_about = "Apply migrations and check runtime readiness for an Askbridge deployment."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Check config, relay credentials, and database connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let output = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", output.render());
    ExitCode::from(output.exit_code)
}
