//! Command definitions
//!
//! The opcode registry and the request frame.

use bytes::Bytes;

use super::extras::{Extras, ExtrasLayout};

/// Operation family, used for type gating on the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Plain key/value operations (get, set, incr, ...)
    Plain,
    /// Operations valid on every item type (delete, attributes)
    Any,
    List,
    Set,
    Btree,
    /// Server administration (flush, stats, version, vbuckets, ...)
    Admin,
    /// SASL authentication
    Auth,
}

/// Command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Get = 0x00,
    Set = 0x01,
    Add = 0x02,
    Replace = 0x03,
    Delete = 0x04,
    Increment = 0x05,
    Decrement = 0x06,
    Quit = 0x07,
    Flush = 0x08,
    GetQ = 0x09,
    Noop = 0x0a,
    Version = 0x0b,
    Append = 0x0e,
    Prepend = 0x0f,
    Stat = 0x10,

    SaslListMechs = 0x20,
    SaslAuth = 0x21,
    SaslStep = 0x22,

    GetAttr = 0x50,
    SetAttr = 0x51,

    LopInsert = 0x60,
    LopDelete = 0x61,
    LopGet = 0x62,
    LopCreate = 0x63,

    SopInsert = 0x70,
    SopDelete = 0x71,
    SopExist = 0x72,
    SopGet = 0x73,
    SopCreate = 0x74,

    BopInsert = 0x80,
    BopDelete = 0x81,
    BopGet = 0x82,

    SetVbucketState = 0x83,
    GetVbucketState = 0x84,
    DeleteVbucket = 0x85,

    BopCreate = 0x86,
    BopCount = 0x87,
}

impl Opcode {
    /// Every registered opcode, in code order
    pub const ALL: [Opcode; 37] = [
        Opcode::Get,
        Opcode::Set,
        Opcode::Add,
        Opcode::Replace,
        Opcode::Delete,
        Opcode::Increment,
        Opcode::Decrement,
        Opcode::Quit,
        Opcode::Flush,
        Opcode::GetQ,
        Opcode::Noop,
        Opcode::Version,
        Opcode::Append,
        Opcode::Prepend,
        Opcode::Stat,
        Opcode::SaslListMechs,
        Opcode::SaslAuth,
        Opcode::SaslStep,
        Opcode::GetAttr,
        Opcode::SetAttr,
        Opcode::LopInsert,
        Opcode::LopDelete,
        Opcode::LopGet,
        Opcode::LopCreate,
        Opcode::SopInsert,
        Opcode::SopDelete,
        Opcode::SopExist,
        Opcode::SopGet,
        Opcode::SopCreate,
        Opcode::BopInsert,
        Opcode::BopDelete,
        Opcode::BopGet,
        Opcode::SetVbucketState,
        Opcode::GetVbucketState,
        Opcode::DeleteVbucket,
        Opcode::BopCreate,
        Opcode::BopCount,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Binary layout of this opcode's extras section
    pub fn layout(self) -> ExtrasLayout {
        match self {
            Opcode::Set | Opcode::Add | Opcode::Replace => ExtrasLayout::Store,
            Opcode::Increment | Opcode::Decrement => ExtrasLayout::Counter,
            Opcode::Flush => ExtrasLayout::Flush,
            Opcode::SetAttr => ExtrasLayout::SetAttr,
            Opcode::LopCreate | Opcode::BopCreate => ExtrasLayout::Create,
            Opcode::SopCreate => ExtrasLayout::SopCreate,
            Opcode::LopInsert => ExtrasLayout::LopInsert,
            Opcode::LopDelete => ExtrasLayout::LopDelete,
            Opcode::LopGet => ExtrasLayout::LopGet,
            Opcode::SopInsert => ExtrasLayout::SopInsert,
            Opcode::SopDelete => ExtrasLayout::SopDelete,
            Opcode::SopGet => ExtrasLayout::SopGet,
            Opcode::BopInsert => ExtrasLayout::BopInsert,
            Opcode::BopDelete => ExtrasLayout::BopDelete,
            Opcode::BopGet => ExtrasLayout::BopGet,
            Opcode::BopCount => ExtrasLayout::BopCount,
            _ => ExtrasLayout::None,
        }
    }

    /// Size in bytes of the extras section this opcode carries
    pub fn extras_len(self) -> usize {
        self.layout().len()
    }

    /// Quiet opcodes suppress their response when the outcome is uninteresting
    pub fn is_quiet(self) -> bool {
        matches!(self, Opcode::GetQ)
    }

    pub fn family(self) -> Family {
        match self {
            Opcode::Get
            | Opcode::GetQ
            | Opcode::Set
            | Opcode::Add
            | Opcode::Replace
            | Opcode::Append
            | Opcode::Prepend
            | Opcode::Increment
            | Opcode::Decrement => Family::Plain,
            Opcode::Delete | Opcode::GetAttr | Opcode::SetAttr => Family::Any,
            Opcode::LopInsert | Opcode::LopDelete | Opcode::LopGet | Opcode::LopCreate => {
                Family::List
            }
            Opcode::SopInsert
            | Opcode::SopDelete
            | Opcode::SopExist
            | Opcode::SopGet
            | Opcode::SopCreate => Family::Set,
            Opcode::BopInsert
            | Opcode::BopDelete
            | Opcode::BopGet
            | Opcode::BopCreate
            | Opcode::BopCount => Family::Btree,
            Opcode::SaslListMechs | Opcode::SaslAuth | Opcode::SaslStep => Family::Auth,
            Opcode::Quit
            | Opcode::Flush
            | Opcode::Noop
            | Opcode::Version
            | Opcode::Stat
            | Opcode::SetVbucketState
            | Opcode::GetVbucketState
            | Opcode::DeleteVbucket => Family::Admin,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Opcode::Get => "get",
            Opcode::Set => "set",
            Opcode::Add => "add",
            Opcode::Replace => "replace",
            Opcode::Delete => "delete",
            Opcode::Increment => "incr",
            Opcode::Decrement => "decr",
            Opcode::Quit => "quit",
            Opcode::Flush => "flush",
            Opcode::GetQ => "getq",
            Opcode::Noop => "noop",
            Opcode::Version => "version",
            Opcode::Append => "append",
            Opcode::Prepend => "prepend",
            Opcode::Stat => "stat",
            Opcode::SaslListMechs => "sasl_list_mechs",
            Opcode::SaslAuth => "sasl_auth",
            Opcode::SaslStep => "sasl_step",
            Opcode::GetAttr => "getattr",
            Opcode::SetAttr => "setattr",
            Opcode::LopInsert => "lop_insert",
            Opcode::LopDelete => "lop_delete",
            Opcode::LopGet => "lop_get",
            Opcode::LopCreate => "lop_create",
            Opcode::SopInsert => "sop_insert",
            Opcode::SopDelete => "sop_delete",
            Opcode::SopExist => "sop_exist",
            Opcode::SopGet => "sop_get",
            Opcode::SopCreate => "sop_create",
            Opcode::BopInsert => "bop_insert",
            Opcode::BopDelete => "bop_delete",
            Opcode::BopGet => "bop_get",
            Opcode::SetVbucketState => "set_vbucket_state",
            Opcode::GetVbucketState => "get_vbucket_state",
            Opcode::DeleteVbucket => "delete_vbucket",
            Opcode::BopCreate => "bop_create",
            Opcode::BopCount => "bop_count",
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        let op = match code {
            0x00 => Opcode::Get,
            0x01 => Opcode::Set,
            0x02 => Opcode::Add,
            0x03 => Opcode::Replace,
            0x04 => Opcode::Delete,
            0x05 => Opcode::Increment,
            0x06 => Opcode::Decrement,
            0x07 => Opcode::Quit,
            0x08 => Opcode::Flush,
            0x09 => Opcode::GetQ,
            0x0a => Opcode::Noop,
            0x0b => Opcode::Version,
            0x0e => Opcode::Append,
            0x0f => Opcode::Prepend,
            0x10 => Opcode::Stat,
            0x20 => Opcode::SaslListMechs,
            0x21 => Opcode::SaslAuth,
            0x22 => Opcode::SaslStep,
            0x50 => Opcode::GetAttr,
            0x51 => Opcode::SetAttr,
            0x60 => Opcode::LopInsert,
            0x61 => Opcode::LopDelete,
            0x62 => Opcode::LopGet,
            0x63 => Opcode::LopCreate,
            0x70 => Opcode::SopInsert,
            0x71 => Opcode::SopDelete,
            0x72 => Opcode::SopExist,
            0x73 => Opcode::SopGet,
            0x74 => Opcode::SopCreate,
            0x80 => Opcode::BopInsert,
            0x81 => Opcode::BopDelete,
            0x82 => Opcode::BopGet,
            0x83 => Opcode::SetVbucketState,
            0x84 => Opcode::GetVbucketState,
            0x85 => Opcode::DeleteVbucket,
            0x86 => Opcode::BopCreate,
            0x87 => Opcode::BopCount,
            other => return Err(other),
        };
        Ok(op)
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(0x{:02x})", self.name(), self.code())
    }
}

/// A request frame
///
/// `opcode` is kept as the raw byte so that the server can answer unknown
/// commands with the opcode echoed back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub opcode: u8,
    pub vbucket: u16,
    pub opaque: u32,
    pub cas: u64,
    pub extras: Bytes,
    pub key: Bytes,
    pub value: Bytes,
}

impl Request {
    /// Create an empty request for the given opcode
    pub fn new(opcode: Opcode) -> Self {
        Self {
            opcode: opcode.code(),
            vbucket: 0,
            opaque: 0,
            cas: 0,
            extras: Bytes::new(),
            key: Bytes::new(),
            value: Bytes::new(),
        }
    }

    pub fn with_key(mut self, key: impl Into<Bytes>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_value(mut self, value: impl Into<Bytes>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_extras(mut self, extras: &Extras) -> Self {
        self.extras = extras.encode();
        self
    }

    pub fn with_raw_extras(mut self, extras: impl Into<Bytes>) -> Self {
        self.extras = extras.into();
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

    pub fn with_vbucket(mut self, vbucket: u16) -> Self {
        self.vbucket = vbucket;
        self
    }

    /// The registered opcode, if known
    pub fn op(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    /// Total body length as written in the header
    pub fn body_len(&self) -> usize {
        self.extras.len() + self.key.len() + self.value.len()
    }
}
