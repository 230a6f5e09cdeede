//! Control plane of the storage-target daemon.
//!
//! A privileged local client creates, deletes, binds, updates, and shows
//! targets, logical units, and accounts through a binary request/response
//! protocol on an abstract Unix socket. This crate holds the wire codec, the
//! driver capability table, the routing rules, and the transport.
//!
//! ## Layers
//!
//! - [`codec`]: request/response layout and parameter text
//! - [`driver`]: named backends with optional management hooks
//! - [`registry`]: target/device store contract and an in-memory store
//! - [`router`]: mode/op dispatch and response envelope rules
//! - [`ipc`]: socket server, framing, peer check, controller actor, client

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod ipc;
pub mod registry;
pub mod router;

pub use codec::{Mode, Op, Request, Response};
pub use router::Controller;

#[cfg(test)]
mod tests;
