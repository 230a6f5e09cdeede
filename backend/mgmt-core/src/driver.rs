//! Driver capability table.
//!
//! A driver is a storage-protocol backend known by name. Each driver may
//! implement any subset of the management hooks below; an unimplemented hook
//! returns `None` and the router decides what that means for the request
//! (usually `EINVAL`, sometimes nothing at all).
//!
//! The table is filled once at startup and afterwards only read, apart from
//! the `&mut` access hooks need for their own state. It is owned by the
//! controller actor, so hooks never run concurrently.

use crate::codec::{DRIVER_NAME_LEN, Op};

use common::Errno;

use log::info;

/// Identifiers forwarded to a driver's generic `show` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShowQuery {
    /// Raw mode value as received on the wire.
    pub mode: u32,
    pub target_id: i32,
    pub session_id: u64,
    pub connection_id: u32,
    pub lun: u64,
}

/// Account request forwarded to a driver's `account` hook.
#[derive(Debug, Clone, Copy)]
pub struct AccountQuery<'a> {
    pub op: Op,
    pub target_id: i32,
    pub account_id: i32,
    pub params: &'a [u8],
}

/// Optional management hooks of a storage driver.
///
/// Show-style hooks write into `out` and return the number of bytes used.
pub trait Driver: Send {
    fn name(&self) -> &str;

    /// Companion to a successful target create. Failures are logged only.
    fn target_create(&mut self, _target_id: i32, _params: &[u8]) -> Option<Result<(), Errno>> {
        None
    }

    /// Companion to a successful target destroy. Failures are logged only.
    fn target_destroy(&mut self, _target_id: i32) -> Option<Result<(), Errno>> {
        None
    }

    /// Target update for keys the core does not handle itself.
    fn target_update(&mut self, _target_id: i32, _params: &[u8]) -> Option<Result<(), Errno>> {
        None
    }

    fn show(&mut self, _query: &ShowQuery, _out: &mut [u8]) -> Option<Result<usize, Errno>> {
        None
    }

    fn account(
        &mut self,
        _query: &AccountQuery<'_>,
        _out: &mut [u8],
    ) -> Option<Result<usize, Errno>> {
        None
    }
}

/// A driver that is registered by name and implements no hooks.
///
/// The daemon uses it for the driver names listed in its configuration so
/// that target and device management works before any protocol backend
/// attaches richer behaviour.
#[derive(Debug, Clone)]
pub struct StaticDriver {
    name: String,
}

impl StaticDriver {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Driver for StaticDriver {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Registered drivers, addressed by a dense index.
#[derive(Default)]
pub struct DriverTable {
    drivers: Vec<Box<dyn Driver>>,
}

impl DriverTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver and return its index.
    ///
    /// # Errors
    ///
    /// - `EINVAL` if the name is empty or does not fit the wire field
    /// - `EEXIST` if a driver with the same name is already registered
    pub fn register(&mut self, driver: Box<dyn Driver>) -> Result<usize, Errno> {
        let name = driver.name();
        if !is_valid_driver_name(name) {
            return Err(Errno::EINVAL);
        }
        if self.index_of(name).is_some() {
            return Err(Errno::EEXIST);
        }

        let index = self.drivers.len();
        info!("Registered driver '{name}' at index {index}");
        self.drivers.push(driver);
        Ok(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.drivers.iter().position(|d| d.name() == name)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut dyn Driver> {
        match self.drivers.get_mut(index) {
            Some(driver) => Some(driver.as_mut()),
            None => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.drivers.iter().map(|d| d.name())
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

/// 1 to 15 ASCII letters, digits, `_` or `-`.
///
/// Request names are decoded lossily, so keeping registered names ASCII
/// guarantees a garbled name can never resolve to a driver.
pub fn is_valid_driver_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() < DRIVER_NAME_LEN
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
