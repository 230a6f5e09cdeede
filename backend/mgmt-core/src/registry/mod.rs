//! Entity registry contract.
//!
//! The registry owns target and logical-unit records. The management channel
//! only forwards identifiers and parameter bytes to it; identifiers are never
//! interpreted here. [`MemoryRegistry`] is the in-process implementation the
//! daemon ships with.

mod memory;

pub use memory::{IoType, MemoryRegistry, TargetState};

use common::Errno;

pub trait Registry: Send {
    fn target_create(&mut self, driver_index: usize, target_id: i32) -> Result<(), Errno>;

    fn target_destroy(&mut self, target_id: i32) -> Result<(), Errno>;

    fn target_bind(&mut self, target_id: i32, host_no: u32, driver_index: usize)
    -> Result<(), Errno>;

    fn set_target_state(&mut self, target_id: i32, state: &str) -> Result<(), Errno>;

    fn set_target_iotype(&mut self, target_id: i32, iotype: &str) -> Result<(), Errno>;

    /// Write a listing of every target into `out`, returning the bytes used.
    fn show_all_targets(&self, out: &mut [u8]) -> Result<usize, Errno>;

    fn device_create(&mut self, target_id: i32, lun: u64) -> Result<(), Errno>;

    fn device_destroy(&mut self, target_id: i32, lun: u64) -> Result<(), Errno>;

    fn device_update(&mut self, target_id: i32, lun: u64, params: &[u8]) -> Result<(), Errno>;

    /// Write one device's state into `out`, returning the bytes used.
    fn device_show(&self, target_id: i32, lun: u64, out: &mut [u8]) -> Result<usize, Errno>;
}
