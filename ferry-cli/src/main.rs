//! ferry — shuttle files between two directories by age.
//!
//! # Usage
//!
//! ```text
//! ferry start   # read ./config.txt, detach, poll until stopped
//! ferry stop    # send SIGTERM to the running instance
//! ```
//!
//! Any other invocation exits 0 without doing anything. Outcomes are only
//! reported through the log.

mod commands;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use ferry_daemon::DaemonError;

#[derive(Parser, Debug)]
#[command(
    name = "ferry",
    about = "Move files between two directories based on their age",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detach into the background and start polling.
    Start,
    /// Signal the running instance to shut down.
    Stop,
}

fn main() -> ExitCode {
    let Ok(cli) = Cli::try_parse() else {
        return ExitCode::SUCCESS;
    };

    let result = match cli.command {
        Commands::Start => commands::start::run(),
        Commands::Stop => commands::stop::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let errno = err
                .downcast_ref::<DaemonError>()
                .and_then(DaemonError::os_code)
                .unwrap_or_default();
            let message = format!("{err:#}");
            tracing::error!(errno, error = %message, "ferry exited with error");
            ExitCode::FAILURE
        }
    }
}
