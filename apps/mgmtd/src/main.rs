use mgmtd::daemon;
use mgmtd::error::MgmtdError;
use mgmtd::logger::initialize as LoggerInitialize;

use common::ErrorLocation;

use mgmt_core::config::{DEFAULT_CONFIG_PATH, DaemonConfig};

use std::fs::create_dir_all;
use std::panic::Location;
use std::path::PathBuf;
use std::process::ExitCode;

use log::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("mgmtd: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), MgmtdError> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = DaemonConfig::load(&config_path)?;

    if let Some(log_dir) = &config.log.dir {
        create_dir_all(log_dir).map_err(|e| MgmtdError::Logger {
            message: format!("Failed to create log directory: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
    }

    // Initialize logger FIRST
    LoggerInitialize(config.log.level_filter()?, config.log.dir.as_deref())?;

    info!("mgmtd starting with config {}", config_path.display());

    daemon::run(&config).await
}
