//! Peer credential policy.

use crate::config::PeerConfig;
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;

/// Credentials a connecting process must present.
///
/// Both ids must match exactly; there is no "root-equivalent" logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerPolicy {
    uid: u32,
    gid: u32,
}

impl PeerPolicy {
    /// uid 0, gid 0.
    pub const ROOT: PeerPolicy = PeerPolicy { uid: 0, gid: 0 };

    pub const fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }

    /// # Errors
    ///
    /// Returns [`TransportError::PeerRejected`] unless both ids match.
    #[track_caller]
    pub fn check(&self, uid: u32, gid: u32) -> Result<(), TransportError> {
        if uid == self.uid && gid == self.gid {
            return Ok(());
        }
        Err(TransportError::PeerRejected {
            uid,
            gid,
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Default for PeerPolicy {
    fn default() -> Self {
        Self::ROOT
    }
}

impl From<PeerConfig> for PeerPolicy {
    fn from(config: PeerConfig) -> Self {
        Self::new(config.uid, config.gid)
    }
}
