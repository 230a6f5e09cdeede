//! Leaf types shared by the management core and the daemon.
//!
//! - [`ErrorLocation`]: source position attached to every structured error
//! - [`Errno`]: errno-style status reported by registries and driver hooks,
//!   and carried verbatim in response envelopes

pub mod errno;
pub mod error;

pub use errno::Errno;
pub use error::error_location::ErrorLocation;
