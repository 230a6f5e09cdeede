//! Account mode, served entirely by the driver's `account` hook.
//!
//! A failing hook on the Show path is reported to the client as an empty
//! successful listing, never as an error envelope; so is a hook that claims
//! to have written more than the output region holds. A driver without the hook
//! gets `EINVAL` for every op.

use crate::codec::Request;
use crate::driver::{AccountQuery, Driver};

use common::Errno;

use log::{debug, warn};

pub(super) fn handle(
    driver: &mut dyn Driver,
    request: &Request,
    out: &mut [u8],
) -> Result<usize, Errno> {
    let query = AccountQuery {
        op: request.op,
        target_id: request.target_id,
        account_id: request.account_id,
        params: &request.payload,
    };

    let outcome = driver.account(&query, out).ok_or(Errno::EINVAL)?;

    if request.op.is_show() {
        return Ok(match outcome {
            Ok(written) if written > out.len() => {
                warn!(
                    "Driver '{}' account show claims {written} bytes of {}; answering with an empty listing",
                    driver.name(),
                    out.len()
                );
                0
            }
            Ok(written) => written,
            Err(errno) => {
                debug!(
                    "Driver '{}' account show failed: {errno}; answering with an empty listing",
                    driver.name()
                );
                0
            }
        });
    }

    outcome
}
