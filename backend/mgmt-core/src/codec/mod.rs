//! Binary layout of management requests and responses.
//!
//! Every request starts with a fixed [`REQUEST_HEADER_SIZE`]-byte header whose
//! first field declares the total message length; the remainder is an opaque
//! parameter payload. Responses carry an 8-byte envelope followed by an
//! optional payload produced by a Show handler.
//!
//! All integers are little-endian. Decoding always copies into owned values,
//! and no field is interpreted before the buffer has been checked to hold it.
//!
//! # Request header
//!
//! | offset | field           | type      |
//! |--------|-----------------|-----------|
//! | 0      | `total_length`  | `u32`     |
//! | 4      | `driver_name`   | `[u8; 16]`|
//! | 20     | `mode`          | `u32`     |
//! | 24     | `op`            | `u32`     |
//! | 28     | `target_id`     | `i32`     |
//! | 32     | `session_id`    | `u64`     |
//! | 40     | `lun`           | `u64`     |
//! | 48     | `connection_id` | `u32`     |
//! | 52     | `account_id`    | `i32`     |
//! | 56     | `host_no`       | `u32`     |
//! | 60     | reserved        | `u32`     |

pub mod params;

use crate::error::codec::CodecError;

use common::{Errno, ErrorLocation};

use std::panic::Location;

use bytes::{Buf, BufMut};

/// Width of the NUL-padded driver name field.
pub const DRIVER_NAME_LEN: usize = 16;

pub const REQUEST_HEADER_SIZE: usize = 64;

pub const RESPONSE_HEADER_SIZE: usize = 8;

/// Bytes of the leading `total_length` field, enough to size a request.
pub const LENGTH_FIELD_SIZE: usize = 4;

/// Entity category a request is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    System,
    Target,
    Device,
    Account,
    /// Any other value; meaningful only to the driver's `show` hook.
    DriverDefined(u32),
}

impl Mode {
    const SYSTEM: u32 = 0;
    const TARGET: u32 = 1;
    const DEVICE: u32 = 2;
    const ACCOUNT: u32 = 3;

    pub fn from_wire(value: u32) -> Self {
        match value {
            Self::SYSTEM => Mode::System,
            Self::TARGET => Mode::Target,
            Self::DEVICE => Mode::Device,
            Self::ACCOUNT => Mode::Account,
            other => Mode::DriverDefined(other),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Mode::System => Self::SYSTEM,
            Mode::Target => Self::TARGET,
            Mode::Device => Self::DEVICE,
            Mode::Account => Self::ACCOUNT,
            Mode::DriverDefined(value) => value,
        }
    }
}

/// Action requested against the selected entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    New,
    Delete,
    Bind,
    Update,
    Show,
    /// Unrecognised op value. Not a framing error: the router answers it
    /// with `EINVAL`.
    Unknown(u32),
}

impl Op {
    const NEW: u32 = 0;
    const DELETE: u32 = 1;
    const BIND: u32 = 2;
    const UPDATE: u32 = 3;
    const SHOW: u32 = 4;

    pub fn from_wire(value: u32) -> Self {
        match value {
            Self::NEW => Op::New,
            Self::DELETE => Op::Delete,
            Self::BIND => Op::Bind,
            Self::UPDATE => Op::Update,
            Self::SHOW => Op::Show,
            other => Op::Unknown(other),
        }
    }

    pub fn to_wire(self) -> u32 {
        match self {
            Op::New => Self::NEW,
            Op::Delete => Self::DELETE,
            Op::Bind => Self::BIND,
            Op::Update => Self::UPDATE,
            Op::Show => Self::SHOW,
            Op::Unknown(value) => value,
        }
    }

    pub fn is_show(self) -> bool {
        self == Op::Show
    }
}

/// A decoded management request.
///
/// Identifiers are opaque keys into external registries and are forwarded
/// untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Name as received; bytes that are not UTF-8 decode to U+FFFD.
    pub driver_name: String,
    pub mode: Mode,
    pub op: Op,
    pub target_id: i32,
    pub session_id: u64,
    pub connection_id: u32,
    pub lun: u64,
    pub account_id: i32,
    pub host_no: u32,
    pub payload: Vec<u8>,
}

impl Request {
    pub fn new(driver_name: impl Into<String>, mode: Mode, op: Op) -> Self {
        Self {
            driver_name: driver_name.into(),
            mode,
            op,
            target_id: 0,
            session_id: 0,
            connection_id: 0,
            lun: 0,
            account_id: 0,
            host_no: 0,
            payload: Vec::new(),
        }
    }

    pub fn with_target(mut self, target_id: i32) -> Self {
        self.target_id = target_id;
        self
    }

    pub fn with_lun(mut self, lun: u64) -> Self {
        self.lun = lun;
        self
    }

    pub fn with_session(mut self, session_id: u64, connection_id: u32) -> Self {
        self.session_id = session_id;
        self.connection_id = connection_id;
        self
    }

    pub fn with_account(mut self, account_id: i32) -> Self {
        self.account_id = account_id;
        self
    }

    pub fn with_host(mut self, host_no: u32) -> Self {
        self.host_no = host_no;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// Header size plus payload size.
    pub fn encoded_len(&self) -> usize {
        REQUEST_HEADER_SIZE + self.payload.len()
    }

    /// Serialise the request the way an administrative client sends it.
    ///
    /// # Errors
    ///
    /// See [`encode_into`](Self::encode_into).
    #[track_caller]
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut buf)?;
        Ok(buf)
    }

    /// Append the encoded request to `dst`. Nothing is written on error.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if the driver name does not fit its
    /// field, if a driver-defined mode collides with a reserved mode value,
    /// or if the message length overflows `u32`.
    #[track_caller]
    pub fn encode_into<B: BufMut>(&self, dst: &mut B) -> Result<(), CodecError> {
        let name = self.driver_name.as_bytes();
        if name.len() >= DRIVER_NAME_LEN || name.contains(&0) {
            return Err(CodecError::Encode {
                message: format!(
                    "driver name {:?} must be under {DRIVER_NAME_LEN} bytes without NUL",
                    self.driver_name
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if let Mode::DriverDefined(value) = self.mode
            && Mode::from_wire(value) != self.mode
        {
            return Err(CodecError::Encode {
                message: format!("driver-defined mode {value} collides with a reserved mode"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let total_length = u32::try_from(self.encoded_len()).map_err(|_| CodecError::Encode {
            message: format!("payload of {} bytes is too large", self.payload.len()),
            location: ErrorLocation::from(Location::caller()),
        })?;

        dst.put_u32_le(total_length);
        dst.put_slice(name);
        dst.put_bytes(0, DRIVER_NAME_LEN - name.len());
        dst.put_u32_le(self.mode.to_wire());
        dst.put_u32_le(self.op.to_wire());
        dst.put_i32_le(self.target_id);
        dst.put_u64_le(self.session_id);
        dst.put_u64_le(self.lun);
        dst.put_u32_le(self.connection_id);
        dst.put_i32_le(self.account_id);
        dst.put_u32_le(self.host_no);
        // reserved
        dst.put_u32_le(0);
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Decode one complete request from `buf`.
    ///
    /// `capacity` is the receive buffer size the message had to fit in; see
    /// [`check_length`].
    ///
    /// # Errors
    ///
    /// - [`CodecError::MalformedHeader`] if `buf` is shorter than the header or
    ///   than the declared length
    /// - [`CodecError::OversizedMessage`] if the declared length exceeds `capacity`
    #[track_caller]
    pub fn decode(buf: &[u8], capacity: usize) -> Result<Self, CodecError> {
        let declared = declared_length(buf)?;
        let total = check_length(declared, capacity)?;

        if buf.len() < total {
            return Err(CodecError::MalformedHeader {
                message: format!("message truncated: have {} of {total} bytes", buf.len()),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let mut header = &buf[LENGTH_FIELD_SIZE..REQUEST_HEADER_SIZE];

        let mut name_field = [0u8; DRIVER_NAME_LEN];
        header.copy_to_slice(&mut name_field);
        let driver_name = decode_driver_name(&name_field);

        let mode = Mode::from_wire(header.get_u32_le());
        let op = Op::from_wire(header.get_u32_le());
        let target_id = header.get_i32_le();
        let session_id = header.get_u64_le();
        let lun = header.get_u64_le();
        let connection_id = header.get_u32_le();
        let account_id = header.get_i32_le();
        let host_no = header.get_u32_le();

        Ok(Self {
            driver_name,
            mode,
            op,
            target_id,
            session_id,
            connection_id,
            lun,
            account_id,
            host_no,
            payload: buf[REQUEST_HEADER_SIZE..total].to_vec(),
        })
    }
}

/// Text up to the first NUL. Never fails: a name that is not UTF-8 simply
/// matches no registered driver.
fn decode_driver_name(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Read the declared `total_length` from the start of a request.
///
/// # Errors
///
/// Returns [`CodecError::MalformedHeader`] if fewer than
/// [`REQUEST_HEADER_SIZE`] bytes are present.
#[track_caller]
pub fn declared_length(header: &[u8]) -> Result<u32, CodecError> {
    if header.len() < REQUEST_HEADER_SIZE {
        return Err(CodecError::MalformedHeader {
            message: format!(
                "need {REQUEST_HEADER_SIZE} header bytes, got {}",
                header.len()
            ),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok((&header[..LENGTH_FIELD_SIZE]).get_u32_le())
}

/// Validate a declared request length against the receive buffer capacity.
///
/// Returns the length as `usize` when `REQUEST_HEADER_SIZE <= declared <= capacity`.
///
/// # Errors
///
/// - [`CodecError::MalformedHeader`] if the length cannot even cover the header
/// - [`CodecError::OversizedMessage`] if it exceeds `capacity`
#[track_caller]
pub fn check_length(declared: u32, capacity: usize) -> Result<usize, CodecError> {
    let total = declared as usize;
    if total < REQUEST_HEADER_SIZE {
        return Err(CodecError::MalformedHeader {
            message: format!("declared length {declared} is shorter than the header"),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    if total > capacity {
        return Err(CodecError::OversizedMessage {
            declared,
            capacity,
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(total)
}

/// Response envelope plus optional Show payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub error_code: i32,
    pub total_length: u32,
    pub payload: Vec<u8>,
}

impl Response {
    /// Envelope with no payload.
    pub fn empty(error_code: i32) -> Self {
        Self {
            error_code,
            total_length: RESPONSE_HEADER_SIZE as u32,
            payload: Vec::new(),
        }
    }

    /// Successful Show carrying `payload`.
    ///
    /// The caller guarantees the payload fits the response capacity, which
    /// is far below `u32::MAX`.
    pub fn with_payload(payload: Vec<u8>) -> Self {
        Self {
            error_code: 0,
            total_length: (RESPONSE_HEADER_SIZE + payload.len()) as u32,
            payload,
        }
    }

    /// The reported failure, whichever sign it was sent with.
    pub fn errno(&self) -> Option<Errno> {
        Errno::new(self.error_code)
    }

    /// Header followed by payload, exactly `total_length` bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RESPONSE_HEADER_SIZE + self.payload.len());
        self.encode_into(&mut buf);
        buf
    }

    pub fn encode_into<B: BufMut>(&self, dst: &mut B) {
        dst.put_i32_le(self.error_code);
        dst.put_u32_le(self.total_length);
        dst.put_slice(&self.payload);
    }

    /// Read the `total_length` field of a response header.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedHeader`] if the header is incomplete or
    /// declares less than its own size.
    #[track_caller]
    pub fn declared_length(header: &[u8]) -> Result<usize, CodecError> {
        if header.len() < RESPONSE_HEADER_SIZE {
            return Err(CodecError::MalformedHeader {
                message: format!(
                    "need {RESPONSE_HEADER_SIZE} response header bytes, got {}",
                    header.len()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let total = (&header[4..RESPONSE_HEADER_SIZE]).get_u32_le() as usize;
        if total < RESPONSE_HEADER_SIZE {
            return Err(CodecError::MalformedHeader {
                message: format!("response length {total} is shorter than its header"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(total)
    }

    /// Decode a complete response.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MalformedHeader`] if `buf` does not hold the
    /// declared number of bytes.
    #[track_caller]
    pub fn decode(buf: &[u8]) -> Result<Self, CodecError> {
        let total = Self::declared_length(buf)?;
        if buf.len() < total {
            return Err(CodecError::MalformedHeader {
                message: format!("response truncated: have {} of {total} bytes", buf.len()),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(Self {
            error_code: (&buf[..4]).get_i32_le(),
            total_length: total as u32,
            payload: buf[RESPONSE_HEADER_SIZE..total].to_vec(),
        })
    }
}
