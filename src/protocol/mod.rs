//! Protocol Module
//!
//! Defines the binary wire protocol shared by the client session and the
//! server.
//!
//! ## Frame Format
//!
//! ```text
//! ┌──────────────────────────┬─────────┬─────────┬─────────────────┐
//! │      Header (24)         │ Extras  │   Key   │      Value      │
//! └──────────────────────────┴─────────┴─────────┴─────────────────┘
//! ```
//!
//! Requests start with magic `0x80`, responses with `0x81`. The header
//! carries the opcode, the section lengths, the vbucket id (requests) or
//! status (responses), an opaque correlation token and a CAS value.
//!
//! ### Command families
//! - 0x00..0x10: plain key/value and administration
//! - 0x20..0x22: SASL
//! - 0x50..0x51: attributes
//! - 0x60..0x63: lists
//! - 0x70..0x74: sets
//! - 0x80..0x87: b-trees and vbucket administration

mod codec;
mod command;
mod extras;
pub mod payload;
mod response;
mod vbucket;

pub use codec::{
    decode_request, decode_request_header, decode_response, decode_response_header,
    encode_request, encode_response, read_request, read_response, write_request, write_response,
    RequestHeader, ResponseHeader, HEADER_SIZE, MAX_BODY_SIZE, REQUEST_MAGIC, RESPONSE_MAGIC,
};
pub use command::{Family, Opcode, Request};
pub use extras::{CreateAttrs, Extras, ExtrasLayout, Field};
pub use response::{Response, Status};
pub use vbucket::VbucketState;
