//! Controller ownership using the actor pattern.
//!
//! Connection tasks run concurrently, but the entity registry and the driver
//! table are owned by a single task that handles one request at a time.
//! Registry and driver hook code therefore never needs its own locking,
//! and every request/response cycle is atomic with respect to the others.
//! Anything else that mutates the registry must go through this actor too.

use crate::codec::{Request, Response};
use crate::error::transport::TransportError;
use crate::router::Controller;

use common::ErrorLocation;

use std::panic::Location;

use log::{debug, info, warn};
use tokio::sync::{mpsc, oneshot};

/// Pending requests the actor will queue before senders wait.
const COMMAND_QUEUE_DEPTH: usize = 32;

/// Commands processed by the controller actor.
#[derive(Debug)]
pub enum ControlCommand {
    /// Handle one request and reply with its response.
    Process {
        request: Request,
        capacity: usize,
        reply: oneshot::Sender<Response>,
    },
}

/// Cloneable handle to the controller actor.
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: mpsc::Sender<ControlCommand>,
}

impl ControllerHandle {
    /// Move `controller` into a new actor task.
    ///
    /// The actor stops once every handle has been dropped.
    pub fn spawn(controller: Controller) -> Self {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        tokio::spawn(controller_actor(command_rx, controller));
        info!("Controller actor spawned");
        Self { command_tx }
    }

    /// Handle `request` on the actor and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Controller`] if the actor is gone.
    pub async fn process(
        &self,
        request: Request,
        capacity: usize,
    ) -> Result<Response, TransportError> {
        let (reply, response_rx) = oneshot::channel();

        self.command_tx
            .send(ControlCommand::Process {
                request,
                capacity,
                reply,
            })
            .await
            .map_err(|e| TransportError::Controller {
                message: format!("Controller actor died: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        response_rx.await.map_err(|e| TransportError::Controller {
            message: format!("Controller dropped the reply: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

async fn controller_actor(mut command_rx: mpsc::Receiver<ControlCommand>, mut controller: Controller) {
    info!(
        "Controller actor started with {} driver(s)",
        controller.drivers().len()
    );

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            ControlCommand::Process {
                request,
                capacity,
                reply,
            } => {
                let response = controller.process(&request, capacity);
                if reply.send(response).is_err() {
                    debug!("Connection went away before its response was ready");
                }
            }
        }
    }

    warn!("Controller actor stopped");
}
