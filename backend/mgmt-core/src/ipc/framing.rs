//! Length-prefixed framing for both ends of the management socket.
//!
//! [`MgmtCodec`] is the server side: it decodes requests and encodes
//! responses. The declared length is checked against the receive capacity as
//! soon as its four bytes arrive, before any buffer space is reserved for the
//! rest of the message. [`MgmtClientCodec`] is the mirror image used by
//! [`client`](super::client).

use crate::codec::{
    self, LENGTH_FIELD_SIZE, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE, Request, Response,
};
use crate::error::transport::TransportError;

use common::ErrorLocation;

use std::panic::Location;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::time::{Instant, timeout_at};
use tokio_util::codec::{Decoder, Encoder, FramedRead};

/// Server-side codec: one [`Request`] in, one [`Response`] out.
#[derive(Debug, Clone, Copy)]
pub struct MgmtCodec {
    capacity: usize,
}

impl MgmtCodec {
    /// `capacity` bounds the declared length of an incoming request.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Message length once the length field is buffered.
    fn peek_length(&self, src: &BytesMut) -> Result<Option<usize>, TransportError> {
        if src.len() < LENGTH_FIELD_SIZE {
            return Ok(None);
        }
        let declared = (&src[..LENGTH_FIELD_SIZE]).get_u32_le();
        Ok(Some(codec::check_length(declared, self.capacity)?))
    }
}

impl Decoder for MgmtCodec {
    type Item = Request;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Request>, TransportError> {
        let Some(total) = self.peek_length(src)? else {
            return Ok(None);
        };

        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        Ok(Some(Request::decode(&frame, self.capacity)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Request>, TransportError> {
        if let Some(request) = self.decode(src)? {
            return Ok(Some(request));
        }

        let expected = self.peek_length(src)?.unwrap_or(REQUEST_HEADER_SIZE);
        Err(TransportError::ShortRead {
            expected,
            received: src.len(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Encoder<&Response> for MgmtCodec {
    type Error = TransportError;

    fn encode(&mut self, response: &Response, dst: &mut BytesMut) -> Result<(), TransportError> {
        dst.reserve(response.total_length as usize);
        response.encode_into(dst);
        Ok(())
    }
}

/// Client-side codec: one [`Request`] out, one [`Response`] in.
#[derive(Debug, Clone, Copy, Default)]
pub struct MgmtClientCodec;

impl Decoder for MgmtClientCodec {
    type Item = Response;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Response>, TransportError> {
        if src.len() < RESPONSE_HEADER_SIZE {
            return Ok(None);
        }

        let total = Response::declared_length(src)?;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }

        let frame = src.split_to(total);
        Ok(Some(Response::decode(&frame)?))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Response>, TransportError> {
        if let Some(response) = self.decode(src)? {
            return Ok(Some(response));
        }

        // Nothing usable means the server hung up on us without answering.
        if src.len() < RESPONSE_HEADER_SIZE {
            return Err(TransportError::ConnectionClosed {
                message: "no response from server".to_string(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        Err(TransportError::ShortRead {
            expected: Response::declared_length(src)?,
            received: src.len(),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

impl Encoder<&Request> for MgmtClientCodec {
    type Error = TransportError;

    fn encode(&mut self, request: &Request, dst: &mut BytesMut) -> Result<(), TransportError> {
        dst.reserve(request.encoded_len());
        request.encode_into(dst)?;
        Ok(())
    }
}

/// Read and decode exactly one request, all of it before `timeout` expires.
///
/// # Errors
///
/// - [`TransportError::Timeout`] if the full message doesn't arrive in time
/// - [`TransportError::ShortRead`] if the peer closes mid-message
/// - [`TransportError::Codec`] for a malformed or oversized header
/// - [`TransportError::Io`] for other socket failures
pub async fn read_request<R>(
    reader: R,
    capacity: usize,
    timeout: Duration,
) -> Result<Request, TransportError>
where
    R: AsyncRead + Unpin,
{
    let deadline = Instant::now() + timeout;
    let mut frames = FramedRead::with_capacity(reader, MgmtCodec::new(capacity), REQUEST_HEADER_SIZE);

    match timeout_at(deadline, frames.next()).await {
        Ok(Some(result)) => result,
        Ok(None) => Err(TransportError::ShortRead {
            expected: REQUEST_HEADER_SIZE,
            received: 0,
            location: ErrorLocation::from(Location::caller()),
        }),
        Err(_) => Err(TransportError::Timeout {
            message: format!("request not received within {timeout:?}"),
            location: ErrorLocation::from(Location::caller()),
        }),
    }
}
