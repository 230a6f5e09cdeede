//! Client side of the management protocol.
//!
//! Used by administrative tooling and by the integration tests.

use crate::codec::{Request, Response};
use crate::error::transport::TransportError;
use crate::ipc::framing::MgmtClientCodec;
use crate::ipc::socket::connect_abstract;

use common::ErrorLocation;

use std::panic::Location;

use futures_util::{SinkExt, StreamExt};
use tokio_util::codec::Framed;

/// Connect to the management socket, send one request, and read its response.
///
/// # Errors
///
/// - [`TransportError::ConnectionClosed`] if the server closed the connection
///   without answering (permission or framing failure on its side)
/// - [`TransportError::ShortRead`] if the response stops inside its payload
/// - [`TransportError::Codec`] if the request can't be encoded or the
///   response is malformed
/// - [`TransportError::Io`] for connect or socket failures
pub async fn send_request(socket_name: &str, request: &Request) -> Result<Response, TransportError> {
    let stream = connect_abstract(socket_name).await?;
    let mut framed = Framed::new(stream, MgmtClientCodec);

    framed.send(request).await?;

    match framed.next().await {
        Some(result) => result,
        None => Err(TransportError::ConnectionClosed {
            message: "no response from server".to_string(),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
