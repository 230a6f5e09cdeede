use crate::codec::params::Params;
use crate::registry::Registry;

use common::Errno;

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FormatResult};
use std::str::FromStr;

use log::{debug, info};

/// Operational state of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetState {
    Offline,
    #[default]
    Ready,
    Running,
}

impl FromStr for TargetState {
    type Err = Errno;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "offline" => Ok(TargetState::Offline),
            "ready" => Ok(TargetState::Ready),
            "running" => Ok(TargetState::Running),
            _ => Err(Errno::EINVAL),
        }
    }
}

impl Display for TargetState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(match self {
            TargetState::Offline => "offline",
            TargetState::Ready => "ready",
            TargetState::Running => "running",
        })
    }
}

/// How a target's logical units reach their backing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IoType {
    #[default]
    Disk,
    Passthrough,
}

impl FromStr for IoType {
    type Err = Errno;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "disk" => Ok(IoType::Disk),
            "passthrough" => Ok(IoType::Passthrough),
            _ => Err(Errno::EINVAL),
        }
    }
}

impl Display for IoType {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FormatResult {
        formatter.write_str(match self {
            IoType::Disk => "disk",
            IoType::Passthrough => "passthrough",
        })
    }
}

#[derive(Debug, Default)]
struct DeviceRecord {
    params: BTreeMap<String, String>,
}

#[derive(Debug)]
struct TargetRecord {
    driver_index: usize,
    state: TargetState,
    iotype: IoType,
    hosts: Vec<u32>,
    devices: BTreeMap<u64, DeviceRecord>,
}

/// In-process target and device registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    targets: BTreeMap<i32, TargetRecord>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn target_state(&self, target_id: i32) -> Option<TargetState> {
        self.targets.get(&target_id).map(|t| t.state)
    }

    pub fn target_iotype(&self, target_id: i32) -> Option<IoType> {
        self.targets.get(&target_id).map(|t| t.iotype)
    }

    pub fn target_hosts(&self, target_id: i32) -> Option<&[u32]> {
        self.targets.get(&target_id).map(|t| t.hosts.as_slice())
    }

    pub fn device_param(&self, target_id: i32, lun: u64, name: &str) -> Option<&str> {
        self.targets
            .get(&target_id)?
            .devices
            .get(&lun)?
            .params
            .get(name)
            .map(String::as_str)
    }

    fn target_mut(&mut self, target_id: i32) -> Result<&mut TargetRecord, Errno> {
        self.targets.get_mut(&target_id).ok_or(Errno::ENOENT)
    }
}

impl Registry for MemoryRegistry {
    fn target_create(&mut self, driver_index: usize, target_id: i32) -> Result<(), Errno> {
        if target_id < 0 {
            return Err(Errno::EINVAL);
        }
        if self.targets.contains_key(&target_id) {
            return Err(Errno::EEXIST);
        }

        self.targets.insert(
            target_id,
            TargetRecord {
                driver_index,
                state: TargetState::default(),
                iotype: IoType::default(),
                hosts: Vec::new(),
                devices: BTreeMap::new(),
            },
        );
        info!("Created target {target_id} for driver {driver_index}");
        Ok(())
    }

    fn target_destroy(&mut self, target_id: i32) -> Result<(), Errno> {
        let target = self.targets.get(&target_id).ok_or(Errno::ENOENT)?;
        if !target.devices.is_empty() {
            return Err(Errno::EBUSY);
        }

        self.targets.remove(&target_id);
        info!("Destroyed target {target_id}");
        Ok(())
    }

    fn target_bind(
        &mut self,
        target_id: i32,
        host_no: u32,
        driver_index: usize,
    ) -> Result<(), Errno> {
        let target = self.target_mut(target_id)?;
        if target.driver_index != driver_index {
            return Err(Errno::EINVAL);
        }
        if target.hosts.contains(&host_no) {
            return Err(Errno::EEXIST);
        }

        target.hosts.push(host_no);
        debug!("Bound target {target_id} to host {host_no}");
        Ok(())
    }

    fn set_target_state(&mut self, target_id: i32, state: &str) -> Result<(), Errno> {
        let state = state.parse::<TargetState>()?;
        self.target_mut(target_id)?.state = state;
        debug!("Target {target_id} state set to {state}");
        Ok(())
    }

    fn set_target_iotype(&mut self, target_id: i32, iotype: &str) -> Result<(), Errno> {
        let iotype = iotype.parse::<IoType>()?;
        self.target_mut(target_id)?.iotype = iotype;
        debug!("Target {target_id} iotype set to {iotype}");
        Ok(())
    }

    fn show_all_targets(&self, out: &mut [u8]) -> Result<usize, Errno> {
        let mut listing = String::new();
        for (target_id, target) in &self.targets {
            listing.push_str(&format!(
                "Target {target_id}: driver {} state {} iotype {}\n",
                target.driver_index, target.state, target.iotype
            ));
            for host_no in &target.hosts {
                listing.push_str(&format!("    Host: {host_no}\n"));
            }
            for lun in target.devices.keys() {
                listing.push_str(&format!("    LUN: {lun}\n"));
            }
        }
        Ok(copy_truncated(listing.as_bytes(), out))
    }

    fn device_create(&mut self, target_id: i32, lun: u64) -> Result<(), Errno> {
        let target = self.target_mut(target_id)?;
        if target.devices.contains_key(&lun) {
            return Err(Errno::EEXIST);
        }

        target.devices.insert(lun, DeviceRecord::default());
        info!("Created device {target_id}:{lun}");
        Ok(())
    }

    fn device_destroy(&mut self, target_id: i32, lun: u64) -> Result<(), Errno> {
        let target = self.target_mut(target_id)?;
        target.devices.remove(&lun).ok_or(Errno::ENOENT)?;
        info!("Destroyed device {target_id}:{lun}");
        Ok(())
    }

    fn device_update(&mut self, target_id: i32, lun: u64, params: &[u8]) -> Result<(), Errno> {
        let entries = Params::new(params).entries()?;
        let device = self
            .target_mut(target_id)?
            .devices
            .get_mut(&lun)
            .ok_or(Errno::ENOENT)?;

        for (name, value) in entries {
            device.params.insert(name.to_string(), value.to_string());
        }
        debug!("Updated device {target_id}:{lun}");
        Ok(())
    }

    fn device_show(&self, target_id: i32, lun: u64, out: &mut [u8]) -> Result<usize, Errno> {
        let device = self
            .targets
            .get(&target_id)
            .ok_or(Errno::ENOENT)?
            .devices
            .get(&lun)
            .ok_or(Errno::ENOENT)?;

        let mut text = format!("LUN: {lun}\n");
        for (name, value) in &device.params {
            text.push_str(&format!("    {name}={value}\n"));
        }
        Ok(copy_truncated(text.as_bytes(), out))
    }
}

/// Copy as much of `text` as fits into `out`.
fn copy_truncated(text: &[u8], out: &mut [u8]) -> usize {
    let len = text.len().min(out.len());
    out[..len].copy_from_slice(&text[..len]);
    len
}
