// Test doubles shared by the unit tests.

use crate::codec::Op;
use crate::driver::{AccountQuery, Driver, ShowQuery};
use crate::registry::{MemoryRegistry, Registry};

use common::Errno;

use std::sync::{Arc, Mutex};

/// Registry wrapper that lets a test inspect state the controller owns.
#[derive(Clone, Default)]
pub(crate) struct SharedRegistry(pub Arc<Mutex<MemoryRegistry>>);

impl SharedRegistry {
    pub(crate) fn inner(&self) -> std::sync::MutexGuard<'_, MemoryRegistry> {
        self.0.lock().expect("registry lock poisoned")
    }
}

impl Registry for SharedRegistry {
    fn target_create(&mut self, driver_index: usize, target_id: i32) -> Result<(), Errno> {
        self.inner().target_create(driver_index, target_id)
    }

    fn target_destroy(&mut self, target_id: i32) -> Result<(), Errno> {
        self.inner().target_destroy(target_id)
    }

    fn target_bind(
        &mut self,
        target_id: i32,
        host_no: u32,
        driver_index: usize,
    ) -> Result<(), Errno> {
        self.inner().target_bind(target_id, host_no, driver_index)
    }

    fn set_target_state(&mut self, target_id: i32, state: &str) -> Result<(), Errno> {
        self.inner().set_target_state(target_id, state)
    }

    fn set_target_iotype(&mut self, target_id: i32, iotype: &str) -> Result<(), Errno> {
        self.inner().set_target_iotype(target_id, iotype)
    }

    fn show_all_targets(&self, out: &mut [u8]) -> Result<usize, Errno> {
        self.inner().show_all_targets(out)
    }

    fn device_create(&mut self, target_id: i32, lun: u64) -> Result<(), Errno> {
        self.inner().device_create(target_id, lun)
    }

    fn device_destroy(&mut self, target_id: i32, lun: u64) -> Result<(), Errno> {
        self.inner().device_destroy(target_id, lun)
    }

    fn device_update(&mut self, target_id: i32, lun: u64, params: &[u8]) -> Result<(), Errno> {
        self.inner().device_update(target_id, lun, params)
    }

    fn device_show(&self, target_id: i32, lun: u64, out: &mut [u8]) -> Result<usize, Errno> {
        self.inner().device_show(target_id, lun, out)
    }
}

/// Hook invocation seen by a [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HookCall {
    TargetCreate { target_id: i32, params: Vec<u8> },
    TargetDestroy { target_id: i32 },
    TargetUpdate { target_id: i32, params: Vec<u8> },
    Show(ShowQuery),
    Account {
        op: Op,
        target_id: i32,
        account_id: i32,
        params: Vec<u8>,
    },
}

/// Driver implementing every hook, with scripted outcomes.
pub(crate) struct RecordingDriver {
    name: String,
    pub(crate) calls: Arc<Mutex<Vec<HookCall>>>,
    pub(crate) companion_error: Option<Errno>,
    pub(crate) update_error: Option<Errno>,
    pub(crate) show_output: Result<Vec<u8>, Errno>,
    /// Overrides the byte count a show hook reports.
    pub(crate) show_claims: Option<usize>,
    pub(crate) account_output: Result<Vec<u8>, Errno>,
    /// Overrides the byte count an account hook reports.
    pub(crate) account_claims: Option<usize>,
}

impl RecordingDriver {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::default(),
            companion_error: None,
            update_error: None,
            show_output: Ok(Vec::new()),
            show_claims: None,
            account_output: Ok(Vec::new()),
            account_claims: None,
        }
    }

    fn record(&self, call: HookCall) {
        self.calls.lock().expect("call log poisoned").push(call);
    }
}

fn write_out(output: &Result<Vec<u8>, Errno>, out: &mut [u8]) -> Result<usize, Errno> {
    let bytes = output.as_ref().map_err(|errno| *errno)?;
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}

impl Driver for RecordingDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_create(&mut self, target_id: i32, params: &[u8]) -> Option<Result<(), Errno>> {
        self.record(HookCall::TargetCreate {
            target_id,
            params: params.to_vec(),
        });
        Some(self.companion_error.map_or(Ok(()), Err))
    }

    fn target_destroy(&mut self, target_id: i32) -> Option<Result<(), Errno>> {
        self.record(HookCall::TargetDestroy { target_id });
        Some(self.companion_error.map_or(Ok(()), Err))
    }

    fn target_update(&mut self, target_id: i32, params: &[u8]) -> Option<Result<(), Errno>> {
        self.record(HookCall::TargetUpdate {
            target_id,
            params: params.to_vec(),
        });
        Some(self.update_error.map_or(Ok(()), Err))
    }

    fn show(&mut self, query: &ShowQuery, out: &mut [u8]) -> Option<Result<usize, Errno>> {
        self.record(HookCall::Show(*query));
        let written = write_out(&self.show_output, out);
        Some(written.map(|n| self.show_claims.unwrap_or(n)))
    }

    fn account(&mut self, query: &AccountQuery<'_>, out: &mut [u8]) -> Option<Result<usize, Errno>> {
        self.record(HookCall::Account {
            op: query.op,
            target_id: query.target_id,
            account_id: query.account_id,
            params: query.params.to_vec(),
        });
        let written = write_out(&self.account_output, out);
        Some(written.map(|n| self.account_claims.unwrap_or(n)))
    }
}
