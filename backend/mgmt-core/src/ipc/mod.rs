//! Local management channel.
//!
//! One request per connection over a Linux abstract-namespace Unix stream
//! socket:
//!
//! 1. accept
//! 2. peer credential check (exact uid/gid match, root by default)
//! 3. frame the request with [`framing::MgmtCodec`]: the declared length is
//!    checked as soon as it arrives, and the whole message must land before
//!    one deadline
//! 4. hand the request to the controller actor, which owns the registry
//!    and driver table and serialises every request
//! 5. single non-blocking write of the response
//! 6. close
//!
//! Framing and permission failures close the connection without a response.
//! Nothing that happens on one connection can stop the server.
//!
//! # Security
//!
//! - The socket lives in the abstract namespace, so it is never reachable
//!   from the network and has no filesystem permissions to get wrong
//! - Peers whose credentials don't match the policy get no bytes back

pub mod client;
mod controller_state;
pub mod framing;
mod handle;
mod peer;
mod server;
mod socket;

pub use controller_state::{ControlCommand, ControllerHandle};
pub use handle::MgmtServerHandle;
pub use peer::PeerPolicy;
pub use server::{ServerOptions, start_mgmt_server};
