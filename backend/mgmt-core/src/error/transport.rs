use crate::error::codec::CodecError;

use common::ErrorLocation;

use std::io::{Error as IoError, ErrorKind};
use std::panic::Location;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum TransportError {
    #[error("Bind Error: {name}: {message} {location}")]
    Bind {
        name: String,
        message: String,
        location: ErrorLocation,
    },

    #[error("Peer Rejected Error: uid={uid} gid={gid} {location}")]
    PeerRejected {
        uid: u32,
        gid: u32,
        location: ErrorLocation,
    },

    #[error("Timeout Error: {message} {location}")]
    Timeout {
        message: String,
        location: ErrorLocation,
    },

    #[error("Short Read Error: got {received} of {expected} bytes {location}")]
    ShortRead {
        expected: usize,
        received: usize,
        location: ErrorLocation,
    },

    #[error("Connection Closed Error: {message} {location}")]
    ConnectionClosed {
        message: String,
        location: ErrorLocation,
    },

    #[error("Send Error: {message} {location}")]
    Send {
        message: String,
        location: ErrorLocation,
    },

    #[error("Controller Error: {message} {location}")]
    Controller {
        message: String,
        location: ErrorLocation,
    },

    #[error("IO Error: {message} {location}")]
    Io {
        message: String,
        location: ErrorLocation,
    },

    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl From<IoError> for TransportError {
    #[track_caller]
    fn from(error: IoError) -> Self {
        match error.kind() {
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => TransportError::ConnectionClosed {
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            },
            _ => TransportError::Io {
                message: error.to_string(),
                location: ErrorLocation::from(Location::caller()),
            },
        }
    }
}
