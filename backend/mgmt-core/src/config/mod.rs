//! Daemon configuration.
//!
//! Loaded from a TOML file. A missing file means "all defaults"; a file that
//! exists but cannot be read, parsed, or validated is an error.
//!
//! ```toml
//! [server]
//! socket_name = "tgt_mgmt_ipc"
//! backlog = 32
//! buffer_size = 4096
//! header_timeout = "5s"
//!
//! [peer]
//! uid = 0
//! gid = 0
//!
//! [drivers]
//! names = ["iscsi"]
//!
//! [log]
//! level = "info"
//! dir = "/var/log/tgt"
//! ```

use crate::codec::{DRIVER_NAME_LEN, REQUEST_HEADER_SIZE};
use crate::driver::is_valid_driver_name;
use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::collections::HashSet;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::time::Duration;

use const_format::concatcp;
use log::{LevelFilter, info};
use serde::Deserialize;

pub const CONFIG_DIR: &str = "/etc/tgt";
pub const CONFIG_FILE_NAME: &str = "mgmtd.toml";
pub const DEFAULT_CONFIG_PATH: &str = concatcp!(CONFIG_DIR, "/", CONFIG_FILE_NAME);

pub const DEFAULT_SOCKET_NAME: &str = "tgt_mgmt_ipc";
pub const DEFAULT_BACKLOG: u32 = 32;
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
pub const DEFAULT_HEADER_TIMEOUT: &str = "5s";

/// Longest abstract socket name: `sun_path` minus the leading NUL.
pub const MAX_SOCKET_NAME_LEN: usize = 107;

// ============================================
// CONFIG STRUCTS
// ============================================

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Abstract-namespace name, without the leading NUL.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
    #[serde(default = "default_backlog")]
    pub backlog: u32,
    /// Receive buffer capacity; also the response capacity.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// How long a peer may take to deliver a complete request (humantime).
    #[serde(default = "default_header_timeout")]
    pub header_timeout: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_name: default_socket_name(),
            backlog: default_backlog(),
            buffer_size: default_buffer_size(),
            header_timeout: default_header_timeout(),
        }
    }
}

/// Credentials a peer must present, matched exactly.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PeerConfig {
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DriversConfig {
    #[serde(default = "default_driver_names")]
    pub names: Vec<String>,
}

impl Default for DriversConfig {
    fn default() -> Self {
        Self {
            names: default_driver_names(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the log file; stdout only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DaemonConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub peer: PeerConfig,

    #[serde(default)]
    pub drivers: DriversConfig,

    #[serde(default)]
    pub log: LogConfig,
}

// ============================================
// DEFAULT FUNCTIONS
// ============================================

fn default_socket_name() -> String {
    DEFAULT_SOCKET_NAME.to_string()
}
fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}
fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_header_timeout() -> String {
    DEFAULT_HEADER_TIMEOUT.to_string()
}
fn default_driver_names() -> Vec<String> {
    vec!["iscsi".to_string()]
}
fn default_log_level() -> String {
    "info".to_string()
}

// ============================================
// IMPLEMENTATION
// ============================================

impl DaemonConfig {
    /// Load and validate the config at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file exists but cannot be read, is not
    /// valid TOML for this schema, or fails [`validate`](Self::validate).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            info!("Config file not found at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            location: ErrorLocation::from(Location::caller()),
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::parse(&contents, path)?;
        info!("Config loaded from {}", path.display());
        Ok(config)
    }

    /// Parse and validate TOML text; `origin` is only used in errors.
    pub fn parse(contents: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: DaemonConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError {
                location: ErrorLocation::from(Location::caller()),
                path: origin.to_path_buf(),
                reason: e.to_string(),
            })?;

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.socket_name.is_empty() || server.socket_name.len() > MAX_SOCKET_NAME_LEN {
            return Err(invalid(format!(
                "socket_name must be 1-{MAX_SOCKET_NAME_LEN} bytes, got {}",
                server.socket_name.len()
            )));
        }

        if server.backlog == 0 || server.backlog > i32::MAX as u32 {
            return Err(invalid(format!("Invalid backlog: {}", server.backlog)));
        }

        if server.buffer_size < REQUEST_HEADER_SIZE {
            return Err(invalid(format!(
                "buffer_size {} is smaller than the {REQUEST_HEADER_SIZE} byte request header",
                server.buffer_size
            )));
        }

        server.header_timeout()?;
        self.log.level_filter()?;

        let mut seen = HashSet::new();
        for name in &self.drivers.names {
            if !is_valid_driver_name(name) {
                return Err(invalid(format!(
                    "driver name {name:?} must be 1-{} ASCII letters, digits, '_' or '-'",
                    DRIVER_NAME_LEN - 1
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(format!("driver name {name:?} listed twice")));
            }
        }

        Ok(())
    }
}

impl ServerConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the value is not a
    /// humantime duration or is zero.
    pub fn header_timeout(&self) -> Result<Duration, ConfigError> {
        let timeout = humantime::parse_duration(&self.header_timeout).map_err(|e| {
            invalid(format!("Invalid header_timeout {:?}: {e}", self.header_timeout))
        })?;
        if timeout.is_zero() {
            return Err(invalid("header_timeout must be non-zero".to_string()));
        }
        Ok(timeout)
    }
}

impl LogConfig {
    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        self.level
            .parse::<LevelFilter>()
            .map_err(|_| invalid(format!("Invalid log level: {}", self.level)))
    }
}

#[track_caller]
fn invalid(reason: String) -> ConfigError {
    ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason,
    }
}
