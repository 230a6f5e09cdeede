//! Management server: accept loop and per-connection lifecycle.

use crate::codec::{REQUEST_HEADER_SIZE, Response};
use crate::config::DaemonConfig;
use crate::error::config::ConfigError;
use crate::error::transport::TransportError;
use crate::ipc::controller_state::ControllerHandle;
use crate::ipc::framing::{MgmtCodec, read_request};
use crate::ipc::handle::MgmtServerHandle;
use crate::ipc::peer::PeerPolicy;
use crate::ipc::socket::bind_abstract;
use crate::router::Controller;

use common::ErrorLocation;

use std::panic::Location;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::codec::Encoder;

/// Pause after a failed accept so descriptor exhaustion doesn't spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

/// Upper bound on waiting for the socket to become writable.
const SEND_READY_TIMEOUT: Duration = Duration::from_secs(1);

/// Runtime settings for [`start_mgmt_server`].
#[derive(Debug, Clone)]
pub struct ServerOptions {
    pub socket_name: String,
    pub backlog: u32,
    /// Receive capacity for one request; also bounds the response.
    pub capacity: usize,
    /// Deadline for receiving a complete request after the peer check.
    pub request_timeout: Duration,
    pub peer: PeerPolicy,
}

impl ServerOptions {
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config does not validate.
    pub fn from_config(config: &DaemonConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            socket_name: config.server.socket_name.clone(),
            backlog: config.server.backlog,
            capacity: config.server.buffer_size,
            request_timeout: config.server.header_timeout()?,
            peer: PeerPolicy::from(config.peer),
        })
    }
}

/// Bind the management socket and start serving requests with `controller`.
///
/// # Errors
///
/// Returns [`TransportError::Bind`] if the name is already taken or the
/// socket cannot be set up.
pub async fn start_mgmt_server(
    options: ServerOptions,
    controller: Controller,
) -> Result<MgmtServerHandle, TransportError> {
    if options.capacity < REQUEST_HEADER_SIZE {
        return Err(TransportError::Bind {
            name: options.socket_name.clone(),
            message: format!("capacity {} cannot hold a request header", options.capacity),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    let listener = bind_abstract(&options.socket_name, options.backlog)?;
    info!(
        "Management server listening on @{} (backlog {}, capacity {})",
        options.socket_name, options.backlog, options.capacity
    );

    let socket_name = options.socket_name.clone();
    let controller = ControllerHandle::spawn(controller);
    let accept_task = tokio::spawn(accept_loop(listener, Arc::new(options), controller));

    Ok(MgmtServerHandle::new(socket_name, accept_task))
}

async fn accept_loop(listener: UnixListener, options: Arc<ServerOptions>, controller: ControllerHandle) {
    loop {
        match listener.accept().await {
            Ok((stream, _)) => {
                tokio::spawn(serve_connection(stream, Arc::clone(&options), controller.clone()));
            }
            Err(e) => {
                error!("Can't accept a new connection: {e}");
                tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
            }
        }
    }
}

/// Run one connection to completion; the stream is closed on return.
async fn serve_connection(
    mut stream: UnixStream,
    options: Arc<ServerOptions>,
    controller: ControllerHandle,
) {
    match handle_connection(&mut stream, &options, &controller).await {
        Ok(()) => debug!("Management connection done"),
        Err(TransportError::PeerRejected { uid, gid, .. }) => {
            warn!("Rejected management connection from uid={uid} gid={gid}");
        }
        Err(e) => error!("Management connection aborted: {e}"),
    }
}

async fn handle_connection(
    stream: &mut UnixStream,
    options: &ServerOptions,
    controller: &ControllerHandle,
) -> Result<(), TransportError> {
    let credentials = stream.peer_cred()?;
    options.peer.check(credentials.uid(), credentials.gid())?;

    let request = read_request(&mut *stream, options.capacity, options.request_timeout).await?;
    debug!(
        "Request mode={:?} driver='{}' len={}",
        request.mode,
        request.driver_name,
        request.encoded_len()
    );

    let response = controller.process(request, options.capacity).await?;
    if let Some(errno) = response.errno() {
        debug!("Request failed with {errno}");
    }
    send_response(stream, MgmtCodec::new(options.capacity), &response).await
}

/// One non-blocking write of the whole response. A short write is an error
/// for the log; it is not retried.
async fn send_response(
    stream: &UnixStream,
    mut codec: MgmtCodec,
    response: &Response,
) -> Result<(), TransportError> {
    let mut bytes = BytesMut::new();
    codec.encode(response, &mut bytes)?;

    match tokio::time::timeout(SEND_READY_TIMEOUT, stream.writable()).await {
        Ok(ready) => ready?,
        Err(_) => {
            return Err(TransportError::Send {
                message: "socket never became writable".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }
    }

    match stream.try_write(&bytes) {
        Ok(written) if written == bytes.len() => Ok(()),
        Ok(written) => Err(TransportError::Send {
            message: format!("short write: {written} of {} bytes", bytes.len()),
            location: ErrorLocation::from(Location::caller()),
        }),
        Err(e) => Err(TransportError::Send {
            message: format!("can't write response: {e}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
