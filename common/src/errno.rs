//! Errno-style status codes.
//!
//! Registries and driver hooks report failures as a positive errno magnitude.
//! The management envelope puts that magnitude on the wire with a sign that
//! depends on the operation, so the value is kept as a plain `i32` newtype
//! rather than an exhaustive enum: collaborators may return codes this crate
//! has never heard of and they must round-trip unchanged.

use std::error::Error as StdError;
use std::fmt::{Display, Formatter, Result as FormatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Errno(i32);

impl Errno {
    pub const ENOENT: Errno = Errno(2);
    pub const EIO: Errno = Errno(5);
    pub const EBUSY: Errno = Errno(16);
    pub const EEXIST: Errno = Errno(17);
    pub const EINVAL: Errno = Errno(22);
    pub const ENOSPC: Errno = Errno(28);

    /// Builds an errno from either sign convention; zero is not an error.
    pub const fn new(code: i32) -> Option<Errno> {
        match code {
            0 => None,
            c if c < 0 => Some(Errno(c.wrapping_neg())),
            c => Some(Errno(c)),
        }
    }

    /// Positive magnitude, e.g. `22` for `EINVAL`.
    pub const fn code(self) -> i32 {
        self.0
    }

    /// Kernel-style negative return value, e.g. `-22` for `EINVAL`.
    pub const fn negated(self) -> i32 {
        self.0.wrapping_neg()
    }

    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            2 => Some("ENOENT"),
            5 => Some("EIO"),
            16 => Some("EBUSY"),
            17 => Some("EEXIST"),
            22 => Some("EINVAL"),
            28 => Some("ENOSPC"),
            _ => None,
        }
    }
}

impl Display for Errno {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        match self.name() {
            Some(name) => write!(formatter, "{name} ({})", self.0),
            None => write!(formatter, "errno {}", self.0),
        }
    }
}

impl StdError for Errno {}
