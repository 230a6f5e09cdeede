use common::ErrorLocation;

use mgmt_core::error::config::ConfigError;
use mgmt_core::error::transport::TransportError;

use std::panic::Location;

use thiserror::Error;

/// Errors that stop the daemon from starting or running.
#[derive(Debug, Error)]
pub enum MgmtdError {
    /// Config file unreadable, unparseable, or invalid
    #[error("Config Error: {message} {location}")]
    Config {
        message: String,
        location: ErrorLocation,
    },

    /// Logger could not be set up
    #[error("Logger Error: {message} {location}")]
    Logger {
        message: String,
        location: ErrorLocation,
    },

    /// Driver table or management socket could not be set up
    #[error("Startup Error: {message} {location}")]
    Startup {
        message: String,
        location: ErrorLocation,
    },

    /// Signal handlers could not be installed
    #[error("Signal Error: {message} {location}")]
    Signal {
        message: String,
        location: ErrorLocation,
    },
}

impl From<ConfigError> for MgmtdError {
    #[track_caller]
    fn from(error: ConfigError) -> Self {
        MgmtdError::Config {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

impl From<TransportError> for MgmtdError {
    #[track_caller]
    fn from(error: TransportError) -> Self {
        MgmtdError::Startup {
            message: error.to_string(),
            location: ErrorLocation::from(Location::caller()),
        }
    }
}
