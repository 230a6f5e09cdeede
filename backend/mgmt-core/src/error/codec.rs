use common::ErrorLocation;

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("Malformed Header Error: {message} {location}")]
    MalformedHeader {
        message: String,
        location: ErrorLocation,
    },

    #[error("Oversized Message Error: declared {declared} bytes, capacity {capacity} {location}")]
    OversizedMessage {
        declared: u32,
        capacity: usize,
        location: ErrorLocation,
    },

    #[error("Encode Error: {message} {location}")]
    Encode {
        message: String,
        location: ErrorLocation,
    },
}
