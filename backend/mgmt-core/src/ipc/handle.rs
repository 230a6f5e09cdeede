//! Management server handle.

use tokio::task::JoinHandle;

/// Handle to a running management server.
///
/// Dropping the handle (or calling [`shutdown`](Self::shutdown)) stops
/// accepting and releases the socket name. Connections already accepted run
/// to completion.
pub struct MgmtServerHandle {
    socket_name: String,
    accept_task: JoinHandle<()>,
}

impl MgmtServerHandle {
    pub(crate) fn new(socket_name: String, accept_task: JoinHandle<()>) -> Self {
        Self {
            socket_name,
            accept_task,
        }
    }

    /// Abstract socket name the server listens on (no leading NUL).
    pub fn socket_name(&self) -> &str {
        &self.socket_name
    }

    pub fn is_running(&self) -> bool {
        !self.accept_task.is_finished()
    }

    pub fn shutdown(self) {
        drop(self);
    }
}

impl Drop for MgmtServerHandle {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}
