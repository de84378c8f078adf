//! Wire codec
//!
//! Layout of one serial message:
//! ```text
//! ┌───────┬──────────┬──────────┬─────────────┬──────┐
//! │ START │ Kind     │ Length   │ Payload     │ END  │
//! │ 0x02  │ u16 BE   │ u16 BE   │ Length bytes│ 0x03 │
//! └───────┴──────────┴──────────┴─────────────┴──────┘
//! ```
//!
//! START and END may also appear inside the header or payload; the reader
//! relies on the declared length, not on escaping.

use super::{kinds, Frame, Route, RouteTable, MAX_DECLARED_LENGTH};
use crate::error::{FrameError, FrameResult};

/// Start-of-frame marker
pub const START: u8 = 0x02;

/// End-of-frame marker
pub const END: u8 = 0x03;

/// Header size in bytes (kind + declared length)
pub const HEADER_SIZE: usize = 4;

/// Decoded header block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Event kind
    pub kind: u16,
    /// Payload length announced by the sender
    pub declared_length: u16,
}

impl Header {
    /// Create a header
    pub fn new(kind: u16, declared_length: u16) -> Self {
        Self {
            kind,
            declared_length,
        }
    }
}

/// Encode a header block (big endian)
pub fn encode_header(header: &Header) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..2].copy_from_slice(&header.kind.to_be_bytes());
    buf[2..4].copy_from_slice(&header.declared_length.to_be_bytes());
    buf
}

/// Decode a header block (big endian)
pub fn decode_header(buf: &[u8; HEADER_SIZE]) -> Header {
    Header {
        kind: u16::from_be_bytes([buf[0], buf[1]]),
        declared_length: u16::from_be_bytes([buf[2], buf[3]]),
    }
}

/// Wire size of a frame carrying `payload_len` bytes
pub fn encoded_len(payload_len: usize) -> usize {
    1 + HEADER_SIZE + payload_len + 1
}

/// Serialize a frame into its wire representation
///
/// Fails if the payload does not fit the header's length field or the
/// output buffer cannot be allocated.
pub fn encode(frame: &Frame) -> FrameResult<Vec<u8>> {
    let len = frame.payload.len();
    if len > MAX_DECLARED_LENGTH {
        return Err(FrameError::encode(format!(
            "payload of {} bytes exceeds header limit {}",
            len, MAX_DECLARED_LENGTH
        )));
    }

    let size = encoded_len(len);
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|e| FrameError::encode(format!("cannot allocate {} bytes: {}", size, e)))?;

    buf.push(START);
    buf.extend_from_slice(&encode_header(&Header::new(frame.kind, len as u16)));
    buf.extend_from_slice(&frame.payload);
    buf.push(END);

    debug_assert_eq!(buf.len(), size);
    Ok(buf)
}

/// Routes for the event kinds this protocol defines
///
/// Liveness and acknowledgment frames stay on their own link; everything
/// else crosses the bridge.
pub fn route_table() -> RouteTable {
    RouteTable::new(Route::Forward)
        .with_route(kinds::ALIVE, Route::Consume)
        .with_route(kinds::CONFIRMED, Route::Consume)
}
