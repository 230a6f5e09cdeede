//! Request routing.
//!
//! [`Controller`] owns the entity registry and the driver table. It resolves a
//! request's driver, picks the entity handler for its mode, and folds the
//! handler outcome into a response envelope.
//!
//! # Envelope rules
//!
//! - Show: `Ok(n)` becomes `error_code = 0` with `n` payload bytes; `Err(e)`
//!   becomes `error_code = e` (positive magnitude) with no payload.
//! - Everything else: `error_code` is `0` or the negative errno, and the
//!   response never carries a payload, whatever the handler wrote.
//! - Unknown driver name: positive `ENOENT`, no payload.

mod account;
mod device;
mod target;

use crate::codec::{Mode, Request, Response, RESPONSE_HEADER_SIZE};
use crate::driver::{DriverTable, ShowQuery};
use crate::registry::Registry;

use common::Errno;

use log::{debug, error, warn};

pub struct Controller {
    registry: Box<dyn Registry>,
    drivers: DriverTable,
}

impl Controller {
    pub fn new(registry: Box<dyn Registry>, drivers: DriverTable) -> Self {
        Self { registry, drivers }
    }

    pub fn drivers(&self) -> &DriverTable {
        &self.drivers
    }

    /// Resolve the request's driver by name, then handle it.
    pub fn process(&mut self, request: &Request, response_capacity: usize) -> Response {
        match self.drivers.index_of(&request.driver_name) {
            Some(driver_index) => self.handle_request(driver_index, request, response_capacity),
            None => {
                warn!("Can't find driver '{}'", request.driver_name);
                Response::empty(Errno::ENOENT.code())
            }
        }
    }

    /// Handle a request for an already-resolved driver.
    ///
    /// `response_capacity` bounds the whole response, header included.
    pub fn handle_request(
        &mut self,
        driver_index: usize,
        request: &Request,
        response_capacity: usize,
    ) -> Response {
        debug!(
            "mgmt request: driver={} mode={:?} op={:?} tid={} sid={:#x} cid={} lun={:#x} aid={} len={}",
            driver_index,
            request.mode,
            request.op,
            request.target_id,
            request.session_id,
            request.connection_id,
            request.lun,
            request.account_id,
            request.encoded_len()
        );

        let mut payload = vec![0u8; response_capacity.saturating_sub(RESPONSE_HEADER_SIZE)];
        let outcome = self.dispatch(driver_index, request, &mut payload);

        if let Err(errno) = outcome {
            warn!(
                "mgmt request failed: mode={:?} op={:?} driver={} error={}",
                request.mode, request.op, driver_index, errno
            );
        }

        envelope(request, outcome, payload)
    }

    /// Route a request to its entity handler.
    ///
    /// Returns the number of payload bytes written for Show, `0` otherwise.
    ///
    /// # Errors
    ///
    /// Returns the handler's errno, or `EINVAL` for System mode, an unknown
    /// driver index, or a mode/op pair no handler or hook serves.
    pub fn dispatch(
        &mut self,
        driver_index: usize,
        request: &Request,
        out: &mut [u8],
    ) -> Result<usize, Errno> {
        let driver = self.drivers.get_mut(driver_index).ok_or(Errno::EINVAL)?;
        let registry = self.registry.as_mut();

        match request.mode {
            // reserved
            Mode::System => Err(Errno::EINVAL),
            Mode::Target => target::handle(registry, driver, driver_index, request, out),
            Mode::Device => device::handle(registry, request, out),
            Mode::Account => account::handle(driver, request, out),
            Mode::DriverDefined(mode) => {
                if !request.op.is_show() {
                    return Err(Errno::EINVAL);
                }
                driver
                    .show(&show_query(mode, request), out)
                    .unwrap_or(Err(Errno::EINVAL))
            }
        }
    }
}

fn show_query(mode: u32, request: &Request) -> ShowQuery {
    ShowQuery {
        mode,
        target_id: request.target_id,
        session_id: request.session_id,
        connection_id: request.connection_id,
        lun: request.lun,
    }
}

fn envelope(request: &Request, outcome: Result<usize, Errno>, mut payload: Vec<u8>) -> Response {
    if !request.op.is_show() {
        return match outcome {
            Ok(_) => Response::empty(0),
            Err(errno) => Response::empty(errno.negated()),
        };
    }

    match outcome {
        Ok(written) if written <= payload.len() => {
            payload.truncate(written);
            Response::with_payload(payload)
        }
        Ok(written) => {
            error!(
                "Show handler reported {written} bytes for a {} byte region",
                payload.len()
            );
            Response::empty(Errno::EIO.code())
        }
        Err(errno) => Response::empty(errno.code()),
    }
}
