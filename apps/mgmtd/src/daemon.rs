//! Daemon wiring: config → driver table → controller → management server.

use crate::error::MgmtdError;

use common::ErrorLocation;

use mgmt_core::Controller;
use mgmt_core::config::DaemonConfig;
use mgmt_core::driver::{DriverTable, StaticDriver};
use mgmt_core::ipc::{MgmtServerHandle, ServerOptions, start_mgmt_server};
use mgmt_core::registry::MemoryRegistry;

use std::panic::Location;

use log::info;
use tokio::signal::unix::{SignalKind, signal};

/// Register one hook-less driver per configured name, in order.
///
/// # Errors
///
/// Returns [`MgmtdError::Startup`] if a name is rejected by the table.
pub fn build_drivers(names: &[String]) -> Result<DriverTable, MgmtdError> {
    let mut drivers = DriverTable::new();
    for name in names {
        drivers
            .register(Box::new(StaticDriver::new(name.clone())))
            .map_err(|errno| MgmtdError::Startup {
                message: format!("Can't register driver '{name}': {errno}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
    }
    Ok(drivers)
}

pub fn build_controller(config: &DaemonConfig) -> Result<Controller, MgmtdError> {
    let drivers = build_drivers(&config.drivers.names)?;
    Ok(Controller::new(Box::new(MemoryRegistry::new()), drivers))
}

/// Bind the management socket and start serving.
pub async fn start(config: &DaemonConfig) -> Result<MgmtServerHandle, MgmtdError> {
    let options = ServerOptions::from_config(config)?;
    let controller = build_controller(config)?;
    Ok(start_mgmt_server(options, controller).await?)
}

/// Serve until SIGINT or SIGTERM.
pub async fn run(config: &DaemonConfig) -> Result<(), MgmtdError> {
    let handle = start(config).await?;
    info!("mgmtd ready on @{}", handle.socket_name());

    wait_for_shutdown().await?;

    info!("Shutting down");
    handle.shutdown();
    Ok(())
}

async fn wait_for_shutdown() -> Result<(), MgmtdError> {
    let mut terminate = signal(SignalKind::terminate()).map_err(|e| MgmtdError::Signal {
        message: format!("Can't install SIGTERM handler: {e}"),
        location: ErrorLocation::from(Location::caller()),
    })?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map_err(|e| MgmtdError::Signal {
            message: format!("Can't listen for SIGINT: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }),
        _ = terminate.recv() => Ok(()),
    }
}
