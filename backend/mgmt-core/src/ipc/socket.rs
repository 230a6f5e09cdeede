//! Abstract-namespace Unix socket plumbing.

use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::io::Error as IoError;
use std::os::fd::AsRawFd;
use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{
    SocketAddr as StdSocketAddr, UnixListener as StdUnixListener, UnixStream as StdUnixStream,
};
use std::panic::Location;

use tokio::net::{UnixListener, UnixStream};

/// Bind and listen on `\0<name>`, then hand the socket to the tokio reactor.
///
/// Must be called from within a tokio runtime.
#[track_caller]
pub(crate) fn bind_abstract(name: &str, backlog: u32) -> Result<UnixListener, TransportError> {
    let bind_error = |e: IoError| TransportError::Bind {
        name: name.to_string(),
        message: e.to_string(),
        location: ErrorLocation::from(Location::caller()),
    };

    let addr = StdSocketAddr::from_abstract_name(name.as_bytes()).map_err(bind_error)?;
    let listener = StdUnixListener::bind_addr(&addr).map_err(bind_error)?;
    set_backlog(&listener, backlog).map_err(bind_error)?;
    listener.set_nonblocking(true).map_err(bind_error)?;

    UnixListener::from_std(listener).map_err(bind_error)
}

/// Connect to `\0<name>`.
///
/// std offers no non-blocking connect for abstract addresses, so the connect
/// runs on the blocking pool and the stream is handed to the reactor after.
pub(crate) async fn connect_abstract(name: &str) -> Result<UnixStream, TransportError> {
    let addr = StdSocketAddr::from_abstract_name(name.as_bytes())?;
    let stream = tokio::task::spawn_blocking(move || StdUnixStream::connect_addr(&addr))
        .await
        .map_err(|e| TransportError::Io {
            message: format!("connect task failed: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })??;
    stream.set_nonblocking(true)?;
    Ok(UnixStream::from_std(stream)?)
}

/// std listens with its own backlog; calling `listen` again on a listening
/// socket only adjusts the queue length.
fn set_backlog(listener: &StdUnixListener, backlog: u32) -> Result<(), IoError> {
    let backlog = i32::try_from(backlog).map_err(IoError::other)?;
    // SAFETY: the descriptor is owned by `listener` and stays open for the call.
    let rc = unsafe { libc::listen(listener.as_raw_fd(), backlog) };
    if rc != 0 {
        return Err(IoError::last_os_error());
    }
    Ok(())
}
