//! Device (logical unit) mode. Every op maps straight onto the registry.

use crate::codec::{Op, Request};
use crate::registry::Registry;

use common::Errno;

pub(super) fn handle(
    registry: &mut dyn Registry,
    request: &Request,
    out: &mut [u8],
) -> Result<usize, Errno> {
    let (target_id, lun) = (request.target_id, request.lun);

    match request.op {
        Op::New => registry.device_create(target_id, lun).map(|()| 0),
        Op::Delete => registry.device_destroy(target_id, lun).map(|()| 0),
        Op::Update => registry
            .device_update(target_id, lun, &request.payload)
            .map(|()| 0),
        Op::Show => registry.device_show(target_id, lun, out),
        Op::Bind | Op::Unknown(_) => Err(Errno::EINVAL),
    }
}
