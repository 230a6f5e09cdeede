//! Test helpers for management socket integration tests.
//!
//! - Unique abstract socket names per test
//! - Starting a server with the caller's own credentials allowed
//! - Raw connections for sending malformed bytes

use mgmt_core::Controller;
use mgmt_core::driver::{DriverTable, StaticDriver};
use mgmt_core::error::transport::TransportError;
use mgmt_core::ipc::{MgmtServerHandle, PeerPolicy, ServerOptions, start_mgmt_server};
use mgmt_core::registry::MemoryRegistry;

use std::os::linux::net::SocketAddrExt;
use std::os::unix::net::{SocketAddr, UnixStream as StdUnixStream};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::net::UnixStream;
use uuid::Uuid;

pub const TEST_CAPACITY: usize = 4096;

/// Unique abstract socket name so tests can run in parallel.
pub fn unique_socket_name() -> String {
    format!("mgmt_test_{}", Uuid::new_v4().simple())
}

/// Credentials of the test process, as the kernel reports them to a peer.
pub fn current_policy() -> PeerPolicy {
    let (ours, _theirs) = UnixStream::pair().expect("Failed to create socket pair");
    let credentials = ours.peer_cred().expect("Failed to read peer credentials");
    PeerPolicy::new(credentials.uid(), credentials.gid())
}

/// Policy no test process can satisfy.
pub fn foreign_policy() -> PeerPolicy {
    let (ours, _theirs) = UnixStream::pair().expect("Failed to create socket pair");
    let credentials = ours.peer_cred().expect("Failed to read peer credentials");
    PeerPolicy::new(credentials.uid().wrapping_add(1), credentials.gid())
}

/// Our uid with a gid we don't have.
pub fn foreign_gid_policy() -> PeerPolicy {
    let (ours, _theirs) = UnixStream::pair().expect("Failed to create socket pair");
    let credentials = ours.peer_cred().expect("Failed to read peer credentials");
    PeerPolicy::new(credentials.uid(), credentials.gid().wrapping_add(1))
}

/// Test helper: Start a server with one "iscsi" driver and an empty registry.
pub async fn start_test_server(
    peer: PeerPolicy,
    request_timeout: Duration,
) -> Result<MgmtServerHandle, TransportError> {
    let mut drivers = DriverTable::new();
    drivers
        .register(Box::new(StaticDriver::new("iscsi")))
        .expect("Failed to register driver");
    let controller = Controller::new(Box::new(MemoryRegistry::new()), drivers);

    let options = ServerOptions {
        socket_name: unique_socket_name(),
        backlog: 32,
        capacity: TEST_CAPACITY,
        request_timeout,
        peer,
    };
    start_mgmt_server(options, controller).await
}

/// Test helper: Open a raw connection to the server's socket.
pub fn connect_raw(socket_name: &str) -> UnixStream {
    let addr = SocketAddr::from_abstract_name(socket_name.as_bytes())
        .expect("Invalid abstract socket name");
    let stream = StdUnixStream::connect_addr(&addr).expect("Failed to connect");
    stream
        .set_nonblocking(true)
        .expect("Failed to set non-blocking");
    UnixStream::from_std(stream).expect("Failed to register stream")
}

/// Test helper: Read until EOF (or reset) and return what arrived.
pub async fn read_to_close(stream: &mut UnixStream) -> Vec<u8> {
    let mut received = Vec::new();
    let read = tokio::time::timeout(Duration::from_secs(5), async {
        let mut chunk = [0u8; 256];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => received.extend_from_slice(&chunk[..n]),
            }
        }
    })
    .await;
    assert!(read.is_ok(), "Server never closed the connection");
    received
}
