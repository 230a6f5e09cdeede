//! Target mode.
//!
//! Create and destroy have a driver companion hook that runs after the
//! registry change succeeded. Its outcome is logged and never reported to the
//! client: once the registry record exists (or is gone) the request is done.

use crate::codec::params::Params;
use crate::codec::{Op, Request};
use crate::driver::Driver;
use crate::registry::Registry;
use crate::router::show_query;

use common::Errno;

use log::{debug, warn};

const KEY_STATE: &[u8] = b"state";
const KEY_IOTYPE: &[u8] = b"iotype";

pub(super) fn handle(
    registry: &mut dyn Registry,
    driver: &mut dyn Driver,
    driver_index: usize,
    request: &Request,
    out: &mut [u8],
) -> Result<usize, Errno> {
    let target_id = request.target_id;

    match request.op {
        Op::New => {
            registry.target_create(driver_index, target_id)?;
            let outcome = driver.target_create(target_id, &request.payload);
            companion_outcome(driver.name(), "target_create", target_id, outcome);
            Ok(0)
        }
        Op::Delete => {
            registry.target_destroy(target_id)?;
            let outcome = driver.target_destroy(target_id);
            companion_outcome(driver.name(), "target_destroy", target_id, outcome);
            Ok(0)
        }
        Op::Bind => registry
            .target_bind(target_id, request.host_no, driver_index)
            .map(|()| 0),
        Op::Update => update(registry, driver, target_id, &request.payload).map(|()| 0),
        Op::Show if target_id < 0 => registry.show_all_targets(out),
        Op::Show => driver
            .show(&show_query(request.mode.to_wire(), request), out)
            .unwrap_or(Err(Errno::EINVAL)),
        Op::Unknown(_) => Err(Errno::EINVAL),
    }
}

fn update(
    registry: &mut dyn Registry,
    driver: &mut dyn Driver,
    target_id: i32,
    payload: &[u8],
) -> Result<(), Errno> {
    let params = Params::new(payload);

    match params.key() {
        KEY_STATE => registry.set_target_state(target_id, params.value_str()?),
        KEY_IOTYPE => registry.set_target_iotype(target_id, params.value_str()?),
        _ => driver
            .target_update(target_id, params.raw())
            .unwrap_or(Err(Errno::EINVAL)),
    }
}

/// Log the result of a best-effort companion hook.
fn companion_outcome(
    driver_name: &str,
    hook: &str,
    target_id: i32,
    outcome: Option<Result<(), Errno>>,
) {
    match outcome {
        None => {}
        Some(Ok(())) => debug!("Driver '{driver_name}' {hook} hook done for target {target_id}"),
        Some(Err(errno)) => warn!(
            "Driver '{driver_name}' {hook} hook failed for target {target_id}: {errno} (ignored)"
        ),
    }
}
