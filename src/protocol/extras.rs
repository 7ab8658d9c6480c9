//! Extras (extra-header) layouts
//!
//! Every opcode carries a fixed-size extras section whose field order and
//! widths are described by an [`ExtrasLayout`]. [`Extras`] is the typed value
//! for each layout; it is the only path used to build or parse extras bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::command::Opcode;
use crate::error::{CacheError, Result};

/// One field of an extras layout
///
/// Optional fields may only trail the required ones; a section that stops
/// where they begin decodes them as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub width: usize,
    pub optional: bool,
}

const fn required(name: &'static str, width: usize) -> Field {
    Field {
        name,
        width,
        optional: false,
    }
}

const fn optional(name: &'static str, width: usize) -> Field {
    Field {
        name,
        width,
        optional: true,
    }
}

const STORE_FIELDS: &[Field] = &[required("flags", 4), required("exptime", 4)];
const COUNTER_FIELDS: &[Field] = &[
    required("amount", 8),
    required("initial", 8),
    required("exptime", 4),
];
const FLUSH_FIELDS: &[Field] = &[optional("delay", 4)];
const SETATTR_FIELDS: &[Field] = &[
    required("exptime", 4),
    required("maxcount", 4),
    required("maxbkeyrange", 8),
    required("ovflaction", 1),
    required("exptime_present", 1),
    required("maxcount_present", 1),
    required("maxbkeyrange_present", 1),
];
const CREATE_FIELDS: &[Field] = &[
    required("flags", 4),
    required("exptime", 4),
    required("maxcount", 4),
    required("ovflaction", 1),
    required("reserved", 3),
];
const SOP_CREATE_FIELDS: &[Field] = &[
    required("flags", 4),
    required("exptime", 4),
    required("maxcount", 4),
];
const LOP_INSERT_FIELDS: &[Field] = &[
    required("index", 4),
    required("flags", 4),
    required("exptime", 4),
    required("maxcount", 4),
    required("create", 1),
    required("reserved", 3),
];
const LOP_DELETE_FIELDS: &[Field] = &[
    required("from", 4),
    required("to", 4),
    optional("drop_if_empty", 1),
    optional("reserved", 3),
];
const LOP_GET_FIELDS: &[Field] = &[
    required("from", 4),
    required("to", 4),
    required("delete", 1),
    required("drop_if_empty", 1),
    required("reserved", 2),
];
const SOP_INSERT_FIELDS: &[Field] = &[
    required("flags", 4),
    required("exptime", 4),
    required("maxcount", 4),
    required("create", 1),
    required("reserved", 3),
];
const SOP_DELETE_FIELDS: &[Field] = &[required("drop_if_empty", 1), required("reserved", 3)];
const SOP_GET_FIELDS: &[Field] = &[
    required("count", 4),
    required("delete", 1),
    required("drop_if_empty", 1),
    required("reserved", 2),
];
const BOP_INSERT_FIELDS: &[Field] = &[
    required("bkey", 8),
    required("flags", 4),
    required("exptime", 4),
    required("maxcount", 4),
    required("create", 1),
    required("reserved", 3),
];
const BOP_DELETE_FIELDS: &[Field] = &[
    required("from", 8),
    required("to", 8),
    required("count", 4),
    optional("drop_if_empty", 1),
    optional("reserved", 3),
];
const BOP_GET_FIELDS: &[Field] = &[
    required("from", 8),
    required("to", 8),
    required("offset", 4),
    required("count", 4),
    required("delete", 1),
    required("drop_if_empty", 1),
    required("reserved", 2),
];
const BOP_COUNT_FIELDS: &[Field] = &[required("from", 8), required("to", 8)];

/// Extras layout identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExtrasLayout {
    None,
    Store,
    Counter,
    Flush,
    SetAttr,
    Create,
    SopCreate,
    LopInsert,
    LopDelete,
    LopGet,
    SopInsert,
    SopDelete,
    SopGet,
    BopInsert,
    BopDelete,
    BopGet,
    BopCount,
}

impl ExtrasLayout {
    /// Field list in wire order
    pub fn fields(self) -> &'static [Field] {
        match self {
            ExtrasLayout::None => &[],
            ExtrasLayout::Store => STORE_FIELDS,
            ExtrasLayout::Counter => COUNTER_FIELDS,
            ExtrasLayout::Flush => FLUSH_FIELDS,
            ExtrasLayout::SetAttr => SETATTR_FIELDS,
            ExtrasLayout::Create => CREATE_FIELDS,
            ExtrasLayout::SopCreate => SOP_CREATE_FIELDS,
            ExtrasLayout::LopInsert => LOP_INSERT_FIELDS,
            ExtrasLayout::LopDelete => LOP_DELETE_FIELDS,
            ExtrasLayout::LopGet => LOP_GET_FIELDS,
            ExtrasLayout::SopInsert => SOP_INSERT_FIELDS,
            ExtrasLayout::SopDelete => SOP_DELETE_FIELDS,
            ExtrasLayout::SopGet => SOP_GET_FIELDS,
            ExtrasLayout::BopInsert => BOP_INSERT_FIELDS,
            ExtrasLayout::BopDelete => BOP_DELETE_FIELDS,
            ExtrasLayout::BopGet => BOP_GET_FIELDS,
            ExtrasLayout::BopCount => BOP_COUNT_FIELDS,
        }
    }

    /// Total width in bytes
    pub fn len(self) -> usize {
        self.fields().iter().map(|f| f.width).sum()
    }

    /// Width without the optional trailing fields
    pub fn min_len(self) -> usize {
        self.fields()
            .iter()
            .filter(|f| !f.optional)
            .map(|f| f.width)
            .sum()
    }

    pub fn is_empty(self) -> bool {
        self.len() == 0
    }
}

/// Attributes supplied when a collection is created implicitly by an insert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateAttrs {
    pub flags: u32,
    pub exptime: i32,
    pub maxcount: i32,
}

/// Typed extras, one variant per layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extras {
    None,
    Store {
        flags: u32,
        exptime: u32,
    },
    Counter {
        amount: u64,
        initial: u64,
        exptime: u32,
    },
    Flush {
        delay: u32,
    },
    /// Absent fields are left unchanged; `ovflaction` 0 means unchanged
    SetAttr {
        exptime: Option<i32>,
        maxcount: Option<i32>,
        maxbkeyrange: Option<i64>,
        ovflaction: u8,
    },
    /// List and b-tree creation; `ovflaction` 0 means the type default
    Create {
        attrs: CreateAttrs,
        ovflaction: u8,
    },
    SopCreate {
        attrs: CreateAttrs,
    },
    LopInsert {
        index: i32,
        attrs: CreateAttrs,
        create: bool,
    },
    LopDelete {
        from: i32,
        to: i32,
        drop_if_empty: bool,
    },
    LopGet {
        from: i32,
        to: i32,
        delete: bool,
        drop_if_empty: bool,
    },
    SopInsert {
        attrs: CreateAttrs,
        create: bool,
    },
    SopDelete {
        drop_if_empty: bool,
    },
    SopGet {
        count: u32,
        delete: bool,
        drop_if_empty: bool,
    },
    BopInsert {
        bkey: i64,
        attrs: CreateAttrs,
        create: bool,
    },
    BopDelete {
        from: i64,
        to: i64,
        count: u32,
        drop_if_empty: bool,
    },
    BopGet {
        from: i64,
        to: i64,
        offset: u32,
        count: u32,
        delete: bool,
        drop_if_empty: bool,
    },
    BopCount {
        from: i64,
        to: i64,
    },
}

impl Extras {
    /// The layout this value encodes to
    pub fn layout(&self) -> ExtrasLayout {
        match self {
            Extras::None => ExtrasLayout::None,
            Extras::Store { .. } => ExtrasLayout::Store,
            Extras::Counter { .. } => ExtrasLayout::Counter,
            Extras::Flush { .. } => ExtrasLayout::Flush,
            Extras::SetAttr { .. } => ExtrasLayout::SetAttr,
            Extras::Create { .. } => ExtrasLayout::Create,
            Extras::SopCreate { .. } => ExtrasLayout::SopCreate,
            Extras::LopInsert { .. } => ExtrasLayout::LopInsert,
            Extras::LopDelete { .. } => ExtrasLayout::LopDelete,
            Extras::LopGet { .. } => ExtrasLayout::LopGet,
            Extras::SopInsert { .. } => ExtrasLayout::SopInsert,
            Extras::SopDelete { .. } => ExtrasLayout::SopDelete,
            Extras::SopGet { .. } => ExtrasLayout::SopGet,
            Extras::BopInsert { .. } => ExtrasLayout::BopInsert,
            Extras::BopDelete { .. } => ExtrasLayout::BopDelete,
            Extras::BopGet { .. } => ExtrasLayout::BopGet,
            Extras::BopCount { .. } => ExtrasLayout::BopCount,
        }
    }

    /// Encode to wire bytes (big-endian)
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.layout().len());
        match self {
            Extras::None => {}
            Extras::Store { flags, exptime } => {
                buf.put_u32(*flags);
                buf.put_u32(*exptime);
            }
            Extras::Counter {
                amount,
                initial,
                exptime,
            } => {
                buf.put_u64(*amount);
                buf.put_u64(*initial);
                buf.put_u32(*exptime);
            }
            Extras::Flush { delay } => buf.put_u32(*delay),
            Extras::SetAttr {
                exptime,
                maxcount,
                maxbkeyrange,
                ovflaction,
            } => {
                buf.put_i32(exptime.unwrap_or(0));
                buf.put_i32(maxcount.unwrap_or(0));
                buf.put_i64(maxbkeyrange.unwrap_or(0));
                buf.put_u8(*ovflaction);
                buf.put_u8(exptime.is_some() as u8);
                buf.put_u8(maxcount.is_some() as u8);
                buf.put_u8(maxbkeyrange.is_some() as u8);
            }
            Extras::Create { attrs, ovflaction } => {
                put_attrs(&mut buf, attrs);
                buf.put_u8(*ovflaction);
                buf.put_bytes(0, 3);
            }
            Extras::SopCreate { attrs } => put_attrs(&mut buf, attrs),
            Extras::LopInsert {
                index,
                attrs,
                create,
            } => {
                buf.put_i32(*index);
                put_attrs(&mut buf, attrs);
                buf.put_u8(*create as u8);
                buf.put_bytes(0, 3);
            }
            Extras::LopDelete {
                from,
                to,
                drop_if_empty,
            } => {
                buf.put_i32(*from);
                buf.put_i32(*to);
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 3);
            }
            Extras::LopGet {
                from,
                to,
                delete,
                drop_if_empty,
            } => {
                buf.put_i32(*from);
                buf.put_i32(*to);
                buf.put_u8(*delete as u8);
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 2);
            }
            Extras::SopInsert { attrs, create } => {
                put_attrs(&mut buf, attrs);
                buf.put_u8(*create as u8);
                buf.put_bytes(0, 3);
            }
            Extras::SopDelete { drop_if_empty } => {
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 3);
            }
            Extras::SopGet {
                count,
                delete,
                drop_if_empty,
            } => {
                buf.put_u32(*count);
                buf.put_u8(*delete as u8);
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 2);
            }
            Extras::BopInsert {
                bkey,
                attrs,
                create,
            } => {
                buf.put_i64(*bkey);
                put_attrs(&mut buf, attrs);
                buf.put_u8(*create as u8);
                buf.put_bytes(0, 3);
            }
            Extras::BopDelete {
                from,
                to,
                count,
                drop_if_empty,
            } => {
                buf.put_i64(*from);
                buf.put_i64(*to);
                buf.put_u32(*count);
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 3);
            }
            Extras::BopGet {
                from,
                to,
                offset,
                count,
                delete,
                drop_if_empty,
            } => {
                buf.put_i64(*from);
                buf.put_i64(*to);
                buf.put_u32(*offset);
                buf.put_u32(*count);
                buf.put_u8(*delete as u8);
                buf.put_u8(*drop_if_empty as u8);
                buf.put_bytes(0, 2);
            }
            Extras::BopCount { from, to } => {
                buf.put_i64(*from);
                buf.put_i64(*to);
            }
        }
        buf.freeze()
    }

    /// Decode the extras section of a request for `opcode`
    pub fn for_opcode(opcode: Opcode, bytes: &[u8]) -> Result<Self> {
        Self::decode(opcode.layout(), bytes)
    }

    /// Decode extras bytes according to a layout
    ///
    /// The byte count must be the full layout width, or the width without
    /// its optional trailing fields, which then decode as zero.
    pub fn decode(layout: ExtrasLayout, bytes: &[u8]) -> Result<Self> {
        let full = layout.len();
        if bytes.len() != full && bytes.len() != layout.min_len() {
            return Err(length_error(layout, bytes.len()));
        }

        let padded;
        let mut buf = if bytes.len() == full {
            bytes
        } else {
            let mut owned = bytes.to_vec();
            owned.resize(full, 0);
            padded = owned;
            &padded[..]
        };
        let extras = match layout {
            ExtrasLayout::None => Extras::None,
            ExtrasLayout::Store => Extras::Store {
                flags: buf.get_u32(),
                exptime: buf.get_u32(),
            },
            ExtrasLayout::Counter => Extras::Counter {
                amount: buf.get_u64(),
                initial: buf.get_u64(),
                exptime: buf.get_u32(),
            },
            ExtrasLayout::Flush => Extras::Flush {
                delay: buf.get_u32(),
            },
            ExtrasLayout::SetAttr => {
                let exptime = buf.get_i32();
                let maxcount = buf.get_i32();
                let maxbkeyrange = buf.get_i64();
                let ovflaction = buf.get_u8();
                let exptime_present = buf.get_u8() != 0;
                let maxcount_present = buf.get_u8() != 0;
                let maxbkeyrange_present = buf.get_u8() != 0;
                Extras::SetAttr {
                    exptime: exptime_present.then_some(exptime),
                    maxcount: maxcount_present.then_some(maxcount),
                    maxbkeyrange: maxbkeyrange_present.then_some(maxbkeyrange),
                    ovflaction,
                }
            }
            ExtrasLayout::Create => {
                let attrs = get_attrs(&mut buf);
                let ovflaction = buf.get_u8();
                Extras::Create { attrs, ovflaction }
            }
            ExtrasLayout::SopCreate => Extras::SopCreate {
                attrs: get_attrs(&mut buf),
            },
            ExtrasLayout::LopInsert => {
                let index = buf.get_i32();
                let attrs = get_attrs(&mut buf);
                Extras::LopInsert {
                    index,
                    attrs,
                    create: buf.get_u8() != 0,
                }
            }
            ExtrasLayout::LopDelete => Extras::LopDelete {
                from: buf.get_i32(),
                to: buf.get_i32(),
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::LopGet => Extras::LopGet {
                from: buf.get_i32(),
                to: buf.get_i32(),
                delete: buf.get_u8() != 0,
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::SopInsert => {
                let attrs = get_attrs(&mut buf);
                Extras::SopInsert {
                    attrs,
                    create: buf.get_u8() != 0,
                }
            }
            ExtrasLayout::SopDelete => Extras::SopDelete {
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::SopGet => Extras::SopGet {
                count: buf.get_u32(),
                delete: buf.get_u8() != 0,
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::BopInsert => {
                let bkey = buf.get_i64();
                let attrs = get_attrs(&mut buf);
                Extras::BopInsert {
                    bkey,
                    attrs,
                    create: buf.get_u8() != 0,
                }
            }
            ExtrasLayout::BopDelete => Extras::BopDelete {
                from: buf.get_i64(),
                to: buf.get_i64(),
                count: buf.get_u32(),
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::BopGet => Extras::BopGet {
                from: buf.get_i64(),
                to: buf.get_i64(),
                offset: buf.get_u32(),
                count: buf.get_u32(),
                delete: buf.get_u8() != 0,
                drop_if_empty: buf.get_u8() != 0,
            },
            ExtrasLayout::BopCount => Extras::BopCount {
                from: buf.get_i64(),
                to: buf.get_i64(),
            },
        };
        Ok(extras)
    }
}

fn length_error(layout: ExtrasLayout, len: usize) -> CacheError {
    let mut offset = 0;
    for field in layout.fields() {
        if len < offset + field.width {
            return CacheError::Payload(format!(
                "{:?} extras end inside field `{}` ({} of {} bytes)",
                layout,
                field.name,
                len,
                layout.len()
            ));
        }
        offset += field.width;
    }
    CacheError::Payload(format!(
        "{:?} extras carry {} bytes, expected {}",
        layout,
        len,
        layout.len()
    ))
}

fn put_attrs(buf: &mut BytesMut, attrs: &CreateAttrs) {
    buf.put_u32(attrs.flags);
    buf.put_i32(attrs.exptime);
    buf.put_i32(attrs.maxcount);
}

fn get_attrs(buf: &mut &[u8]) -> CreateAttrs {
    CreateAttrs {
        flags: buf.get_u32(),
        exptime: buf.get_i32(),
        maxcount: buf.get_i32(),
    }
}
