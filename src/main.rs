//! Runs a single price-check cycle and exits.
//!
//! Scheduling is left to cron or CI. The exit code is non-zero only when the
//! configuration or the stored state could not be loaded or saved.

use std::process::ExitCode;

use tracing::error;

use price_watch_lib::infrastructure::config::ConfigManager;
use price_watch_lib::infrastructure::logging::init_logging_with_config;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match ConfigManager::new().load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging_with_config(&config.logging) {
        eprintln!("Failed to initialize logging: {e:#}");
    }

    match price_watch_lib::run_once(&config).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Price check failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
