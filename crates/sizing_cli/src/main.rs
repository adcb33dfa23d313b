//! sizing CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments or request
//! - 3: Ticket could not be fetched
//! - 4: Run cancelled

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sizing_core::{ErrorKind, WorkflowError};

mod commands;

use commands::{Cli, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const FETCH_FAILURE: u8 = 3;
    pub const CANCELLED: u8 = 4;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_json);

    let result = match cli.command {
        Commands::Breakdown(args) => commands::breakdown::execute(args).await,
        Commands::Agents(args) => commands::agents::execute(args).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool, json: bool) {
    let default_level = if verbose { "sizing=debug,info" } else { "sizing=info,warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    let log_result = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };

    if log_result.is_err() {
        // Logging already initialized, continue
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    if let Some(error) = e.downcast_ref::<WorkflowError>() {
        return match error.kind() {
            ErrorKind::ValidationError | ErrorKind::ConfigError | ErrorKind::RegistryError => {
                ExitCodes::INVALID_ARGS
            }
            ErrorKind::FetchFailure => ExitCodes::FETCH_FAILURE,
            ErrorKind::Cancelled => ExitCodes::CANCELLED,
            _ => ExitCodes::GENERAL_ERROR,
        };
    }

    let msg = e.to_string().to_lowercase();
    if msg.contains("argument") || msg.contains("not found") || msg.contains("invalid") {
        ExitCodes::INVALID_ARGS
    } else {
        ExitCodes::GENERAL_ERROR
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizing_core::FetchFailure;

    #[test]
    fn test_categorize_workflow_errors() {
        let fetch = anyhow::Error::from(WorkflowError::from(FetchFailure::not_found("A-1")));
        assert_eq!(categorize_error(&fetch), ExitCodes::FETCH_FAILURE);

        let cancelled = anyhow::Error::from(WorkflowError::Cancelled);
        assert_eq!(categorize_error(&cancelled), ExitCodes::CANCELLED);

        let invalid = anyhow::Error::from(WorkflowError::Validation("ticket id is required".into()));
        assert_eq!(categorize_error(&invalid), ExitCodes::INVALID_ARGS);
    }

    #[test]
    fn test_categorize_other_errors() {
        let err = anyhow::anyhow!("No agents found; check the agents directory argument");
        assert_eq!(categorize_error(&err), ExitCodes::INVALID_ARGS);
        assert_eq!(categorize_error(&anyhow::anyhow!("disk full")), ExitCodes::GENERAL_ERROR);
    }
}
