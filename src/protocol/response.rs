//! Response definitions
//!
//! Status codes and the response frame.

use bytes::Bytes;

use super::command::Opcode;
use crate::error::ErrorCategory;

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    NotFound,
    Exists,
    TooLarge,
    InvalidArguments,
    NotStored,
    NonNumeric,
    AuthError,
    AuthContinue,
    CreatedStored,
    DeletedDropped,
    BadType,
    Overflow,
    BadValue,
    IndexOutOfRange,
    BkeyOutOfRange,
    ElementNotFound,
    ElementExists,
    BadAttribute,
    UnknownCommand,
    OutOfMemory,
    /// A code this crate does not know, preserved as received
    Other(u16),
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Success => 0x00,
            Status::NotFound => 0x01,
            Status::Exists => 0x02,
            Status::TooLarge => 0x03,
            Status::InvalidArguments => 0x04,
            Status::NotStored => 0x05,
            Status::NonNumeric => 0x06,
            Status::AuthError => 0x20,
            Status::AuthContinue => 0x21,
            Status::CreatedStored => 0x30,
            Status::DeletedDropped => 0x31,
            Status::BadType => 0x32,
            Status::Overflow => 0x33,
            Status::BadValue => 0x34,
            Status::IndexOutOfRange => 0x35,
            Status::BkeyOutOfRange => 0x36,
            Status::ElementNotFound => 0x37,
            Status::ElementExists => 0x38,
            Status::BadAttribute => 0x39,
            Status::UnknownCommand => 0x81,
            Status::OutOfMemory => 0x82,
            Status::Other(code) => code,
        }
    }

    /// Statuses that complete an operation normally
    pub fn is_success(self) -> bool {
        matches!(
            self,
            Status::Success | Status::CreatedStored | Status::DeletedDropped
        )
    }

    pub fn category(self) -> ErrorCategory {
        match self {
            Status::NotFound => ErrorCategory::NotFound,
            Status::Exists | Status::NotStored => ErrorCategory::Conflict,
            Status::BadType => ErrorCategory::TypeMismatch,
            Status::Overflow | Status::TooLarge | Status::OutOfMemory => ErrorCategory::Capacity,
            Status::BadValue
            | Status::BadAttribute
            | Status::InvalidArguments
            | Status::NonNumeric => ErrorCategory::ValueValidation,
            Status::IndexOutOfRange | Status::BkeyOutOfRange => ErrorCategory::Range,
            Status::ElementNotFound | Status::ElementExists => ErrorCategory::ElementPresence,
            Status::AuthError | Status::AuthContinue => ErrorCategory::Auth,
            Status::UnknownCommand => ErrorCategory::Protocol,
            Status::Success | Status::CreatedStored | Status::DeletedDropped | Status::Other(_) => {
                ErrorCategory::Other
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::NotFound => "not found",
            Status::Exists => "exists",
            Status::TooLarge => "too large",
            Status::InvalidArguments => "invalid arguments",
            Status::NotStored => "not stored",
            Status::NonNumeric => "non-numeric value",
            Status::AuthError => "auth error",
            Status::AuthContinue => "auth continue",
            Status::CreatedStored => "created and stored",
            Status::DeletedDropped => "deleted and dropped",
            Status::BadType => "bad type",
            Status::Overflow => "overflow",
            Status::BadValue => "bad value",
            Status::IndexOutOfRange => "index out of range",
            Status::BkeyOutOfRange => "bkey out of range",
            Status::ElementNotFound => "element not found",
            Status::ElementExists => "element exists",
            Status::BadAttribute => "bad attribute",
            Status::UnknownCommand => "unknown command",
            Status::OutOfMemory => "out of memory",
            Status::Other(_) => "unrecognized status",
        }
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        match code {
            0x00 => Status::Success,
            0x01 => Status::NotFound,
            0x02 => Status::Exists,
            0x03 => Status::TooLarge,
            0x04 => Status::InvalidArguments,
            0x05 => Status::NotStored,
            0x06 => Status::NonNumeric,
            0x20 => Status::AuthError,
            0x21 => Status::AuthContinue,
            0x30 => Status::CreatedStored,
            0x31 => Status::DeletedDropped,
            0x32 => Status::BadType,
            0x33 => Status::Overflow,
            0x34 => Status::BadValue,
            0x35 => Status::IndexOutOfRange,
            0x36 => Status::BkeyOutOfRange,
            0x37 => Status::ElementNotFound,
            0x38 => Status::ElementExists,
            0x39 => Status::BadAttribute,
            0x81 => Status::UnknownCommand,
            0x82 => Status::OutOfMemory,
            other => Status::Other(other),
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A response frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Opcode echoed from the request
    pub opcode: u8,
    pub status: Status,
    /// Opaque echoed from the request
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Response {
    /// An empty response with the given status
    pub fn new(opcode: u8, status: Status) -> Self {
        Self {
            opcode,
            status,
            opaque: 0,
            cas: 0,
            extras: Bytes::new(),
            key: Bytes::new(),
            value: Bytes::new(),
        }
    }

    /// Create a SUCCESS response for an opcode
    pub fn ok(opcode: Opcode) -> Self {
        Self::new(opcode.code(), Status::Success)
    }

    /// Create an error response whose value carries a short message
    pub fn error(opcode: u8, status: Status, message: &str) -> Self {
        Self::new(opcode, status).with_value(Bytes::copy_from_slice(message.as_bytes()))
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    pub fn with_opaque(mut self, opaque: u32) -> Self {
        self.opaque = opaque;
        self
    }

    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = cas;
        self
    }

    pub fn with_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
        self
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn op(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    pub fn body_len(&self) -> usize {
        self.extras.len() + self.key.len() + self.value.len()
    }
}
