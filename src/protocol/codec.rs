//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! Both directions share a fixed 24-byte header followed by the body.
//! ```text
//! ┌───────┬────────┬──────────┬─────────┬──────────┬────────────────┐
//! │Magic 1│Opcode 1│KeyLen 2  │ExtLen 1 │DataType 1│VBucket/Status 2│
//! ├───────┴────────┴──────────┴─────────┴──────────┴────────────────┤
//! │ Total body length (4)                                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ Opaque (4)                                                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ CAS (8)                                                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ┌───────────┬────────────┬─────────────────────────────────────────┐
//! │  Extras   │    Key     │                 Value                   │
//! └───────────┴────────────┴─────────────────────────────────────────┘
//! ```
//! All integers are big-endian. `extras_len + key_len` never exceeds the
//! total body length.

use std::io::{ErrorKind, Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{Request, Response, Status};
use crate::error::{CacheError, Result};

/// Header size for both requests and responses
pub const HEADER_SIZE: usize = 24;

/// Magic byte of a request frame
pub const REQUEST_MAGIC: u8 = 0x80;

/// Magic byte of a response frame
pub const RESPONSE_MAGIC: u8 = 0x81;

/// Maximum body size (20 MB)
pub const MAX_BODY_SIZE: u32 = 20 * 1024 * 1024;

// =============================================================================
// Headers
// =============================================================================

/// Decoded request header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    pub vbucket: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

/// Decoded response header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub opcode: u8,
    pub key_len: u16,
    pub extras_len: u8,
    pub data_type: u8,
    pub status: u16,
    pub body_len: u32,
    pub opaque: u32,
    pub cas: u64,
}

struct RawHeader {
    magic: u8,
    opcode: u8,
    key_len: u16,
    extras_len: u8,
    data_type: u8,
    word: u16,
    body_len: u32,
    opaque: u32,
    cas: u64,
}

fn parse_header(bytes: &[u8], expected_magic: u8) -> Result<RawHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(CacheError::Framing(format!(
            "Incomplete header: expected {} bytes, got {}",
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let mut buf = &bytes[..HEADER_SIZE];
    let header = RawHeader {
        magic: buf.get_u8(),
        opcode: buf.get_u8(),
        key_len: buf.get_u16(),
        extras_len: buf.get_u8(),
        data_type: buf.get_u8(),
        word: buf.get_u16(),
        body_len: buf.get_u32(),
        opaque: buf.get_u32(),
        cas: buf.get_u64(),
    };

    if header.magic != expected_magic {
        return Err(CacheError::Framing(format!(
            "Bad magic: expected 0x{:02x}, got 0x{:02x}",
            expected_magic, header.magic
        )));
    }

    if header.body_len > MAX_BODY_SIZE {
        return Err(CacheError::Framing(format!(
            "Body too large: {} bytes (max {})",
            header.body_len, MAX_BODY_SIZE
        )));
    }

    let fixed = header.extras_len as u32 + header.key_len as u32;
    if fixed > header.body_len {
        return Err(CacheError::Framing(format!(
            "Extras ({}) and key ({}) exceed body length {}",
            header.extras_len, header.key_len, header.body_len
        )));
    }

    Ok(header)
}

/// Decode and validate a request header
pub fn decode_request_header(bytes: &[u8]) -> Result<RequestHeader> {
    let raw = parse_header(bytes, REQUEST_MAGIC)?;
    Ok(RequestHeader {
        opcode: raw.opcode,
        key_len: raw.key_len,
        extras_len: raw.extras_len,
        data_type: raw.data_type,
        vbucket: raw.word,
        body_len: raw.body_len,
        opaque: raw.opaque,
        cas: raw.cas,
    })
}

/// Decode and validate a response header
pub fn decode_response_header(bytes: &[u8]) -> Result<ResponseHeader> {
    let raw = parse_header(bytes, RESPONSE_MAGIC)?;
    Ok(ResponseHeader {
        opcode: raw.opcode,
        key_len: raw.key_len,
        extras_len: raw.extras_len,
        data_type: raw.data_type,
        status: raw.word,
        body_len: raw.body_len,
        opaque: raw.opaque,
        cas: raw.cas,
    })
}

/// Split a body into extras, key and value
fn split_body(body: Bytes, extras_len: u8, key_len: u16) -> (Bytes, Bytes, Bytes) {
    let mut value = body;
    let extras = value.split_to(extras_len as usize);
    let key = value.split_to(key_len as usize);
    (extras, key, value)
}

fn check_lengths(extras: usize, key: usize, body: usize) -> Result<()> {
    if extras > u8::MAX as usize {
        return Err(CacheError::Framing(format!("Extras too long: {} bytes", extras)));
    }
    if key > u16::MAX as usize {
        return Err(CacheError::Framing(format!("Key too long: {} bytes", key)));
    }
    if body > MAX_BODY_SIZE as usize {
        return Err(CacheError::Framing(format!(
            "Body too large: {} bytes (max {})",
            body, MAX_BODY_SIZE
        )));
    }
    Ok(())
}

// =============================================================================
// Request Encoding/Decoding
// =============================================================================

/// Encode a request to bytes
pub fn encode_request(request: &Request) -> Result<Bytes> {
    let body_len = request.body_len();
    check_lengths(request.extras.len(), request.key.len(), body_len)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len);
    buf.put_u8(REQUEST_MAGIC);
    buf.put_u8(request.opcode);
    buf.put_u16(request.key.len() as u16);
    buf.put_u8(request.extras.len() as u8);
    buf.put_u8(0);
    buf.put_u16(request.vbucket);
    buf.put_u32(body_len as u32);
    buf.put_u32(request.opaque);
    buf.put_u64(request.cas);
    buf.put_slice(&request.extras);
    buf.put_slice(&request.key);
    buf.put_slice(&request.value);
    Ok(buf.freeze())
}

/// Decode a complete request (header and body) from bytes
pub fn decode_request(bytes: &[u8]) -> Result<Request> {
    let header = decode_request_header(bytes)?;
    let total = HEADER_SIZE + header.body_len as usize;
    if bytes.len() < total {
        return Err(CacheError::Framing(format!(
            "Incomplete body: expected {} bytes, got {}",
            total,
            bytes.len()
        )));
    }
    let body = Bytes::copy_from_slice(&bytes[HEADER_SIZE..total]);
    Ok(request_from_parts(&header, body))
}

fn request_from_parts(header: &RequestHeader, body: Bytes) -> Request {
    let (extras, key, value) = split_body(body, header.extras_len, header.key_len);
    Request {
        opcode: header.opcode,
        vbucket: header.vbucket,
        opaque: header.opaque,
        cas: header.cas,
        extras,
        key,
        value,
    }
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
pub fn encode_response(response: &Response) -> Result<Bytes> {
    let body_len = response.body_len();
    check_lengths(response.extras.len(), response.key.len(), body_len)?;

    let mut buf = BytesMut::with_capacity(HEADER_SIZE + body_len);
    buf.put_u8(RESPONSE_MAGIC);
    buf.put_u8(response.opcode);
    buf.put_u16(response.key.len() as u16);
    buf.put_u8(response.extras.len() as u8);
    buf.put_u8(0);
    buf.put_u16(response.status.code());
    buf.put_u32(body_len as u32);
    buf.put_u32(response.opaque);
    buf.put_u64(response.cas);
    buf.put_slice(&response.extras);
    buf.put_slice(&response.key);
    buf.put_slice(&response.value);
    Ok(buf.freeze())
}

/// Decode a complete response (header and body) from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let header = decode_response_header(bytes)?;
    let total = HEADER_SIZE + header.body_len as usize;
    if bytes.len() < total {
        return Err(CacheError::Framing(format!(
            "Incomplete response body: expected {} bytes, got {}",
            total,
            bytes.len()
        )));
    }
    let body = Bytes::copy_from_slice(&bytes[HEADER_SIZE..total]);
    Ok(response_from_parts(&header, body))
}

fn response_from_parts(header: &ResponseHeader, body: Bytes) -> Response {
    let (extras, key, value) = split_body(body, header.extras_len, header.key_len);
    Response {
        opcode: header.opcode,
        status: Status::from(header.status),
        opaque: header.opaque,
        cas: header.cas,
        extras,
        key,
        value,
    }
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Fill `buf` completely
///
/// A read returning zero bytes means the peer went away; it is reported as
/// `ConnectionClosed` rather than being treated as data.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(CacheError::ConnectionClosed),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(CacheError::Io(e)),
        }
    }
    Ok(())
}

fn read_body<R: Read>(reader: &mut R, body_len: u32) -> Result<Bytes> {
    let mut body = vec![0u8; body_len as usize];
    if body_len > 0 {
        read_full(reader, &mut body)?;
    }
    Ok(Bytes::from(body))
}

/// Read a complete request from a stream
///
/// Blocks until a complete frame is received or an error occurs
pub fn read_request<R: Read>(reader: &mut R) -> Result<Request> {
    let mut header = [0u8; HEADER_SIZE];
    read_full(reader, &mut header)?;
    let header = decode_request_header(&header)?;
    let body = read_body(reader, header.body_len)?;
    Ok(request_from_parts(&header, body))
}

/// Write a request to a stream
pub fn write_request<W: Write>(writer: &mut W, request: &Request) -> Result<()> {
    let bytes = encode_request(request)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let mut header = [0u8; HEADER_SIZE];
    read_full(reader, &mut header)?;
    let header = decode_response_header(&header)?;
    let body = read_body(reader, header.body_len)?;
    Ok(response_from_parts(&header, body))
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    let bytes = encode_response(response)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
