//! unload - export one table to a semicolon separated csv file

mod args;
mod config;
mod export;
mod logging;

use clap::Parser;
use std::process::ExitCode;

use crate::args::Cli;
use crate::config::{ExportSettings, FileConfig};
use crate::export::RunOutcome;
use crate::logging::LoggingConfig;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let file_config = match FileConfig::discover(cli.config.as_deref()) {
        Ok(file_config) => file_config,
        Err(e) => {
            // Logging is configured from the file, so it is not ready yet
            eprintln!("error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let logging_config = if cli.verbose {
        LoggingConfig::verbose()
    } else {
        LoggingConfig::default().with_filter(file_config.log_filter.clone())
    };
    let _log_guard = match logging::init(
        logging_config.with_log_dir(cli.log_dir.clone().or_else(|| file_config.log_dir.clone())),
    ) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("FATAL: Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "Starting unload");

    let settings = match ExportSettings::resolve(&cli, &file_config) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    match export::run_export(&settings).await {
        Ok(RunOutcome::Written { path, rows }) => {
            tracing::debug!(path = %path.display(), rows, "Unload finished");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::TableNotFound) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %format!("{:#}", e), "Export failed");
            ExitCode::FAILURE
        }
    }
}
