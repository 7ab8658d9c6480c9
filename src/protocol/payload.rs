//! Response payload layouts
//!
//! Collection reads return their elements as length tables followed by the
//! concatenated values:
//! ```text
//! LopGet / SopGet   extras: flags(4) count(4)   value: vlen(4) x N, values
//! BopGet            extras: flags(4) count(4)   value: bkey(8) x N, vlen(4) x N, values
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::collection::{ItemType, OverflowAction};
use crate::error::{CacheError, Result};

fn short(what: &str, need: usize, got: usize) -> CacheError {
    CacheError::Payload(format!("{}: expected {} bytes, got {}", what, need, got))
}

/// Extras of a collection read: flags and element count
pub fn encode_flags_count(flags: u32, count: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u32(flags);
    buf.put_u32(count);
    buf.freeze()
}

pub fn decode_flags_count(extras: &[u8]) -> Result<(u32, u32)> {
    if extras.len() < 8 {
        return Err(short("flags/count extras", 8, extras.len()));
    }
    let mut buf = extras;
    Ok((buf.get_u32(), buf.get_u32()))
}

/// Extras of a get response
pub fn encode_flags(flags: u32) -> Bytes {
    Bytes::copy_from_slice(&flags.to_be_bytes())
}

pub fn decode_flags(extras: &[u8]) -> Result<u32> {
    if extras.len() < 4 {
        return Err(short("flags extras", 4, extras.len()));
    }
    let mut buf = extras;
    Ok(buf.get_u32())
}

/// Counter value carried by incr/decr responses
pub fn encode_u64(value: u64) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

pub fn decode_u64(value: &[u8]) -> Result<u64> {
    if value.len() != 8 {
        return Err(short("counter value", 8, value.len()));
    }
    let mut buf = value;
    Ok(buf.get_u64())
}

pub fn encode_u32(value: u32) -> Bytes {
    Bytes::copy_from_slice(&value.to_be_bytes())
}

pub fn decode_u32(value: &[u8]) -> Result<u32> {
    if value.len() != 4 {
        return Err(short("u32 value", 4, value.len()));
    }
    let mut buf = value;
    Ok(buf.get_u32())
}

// =============================================================================
// List / Set batches
// =============================================================================

/// Elements returned by a list or set read
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementBatch {
    pub flags: u32,
    pub values: Vec<Bytes>,
}

impl ElementBatch {
    pub fn encode_extras(&self) -> Bytes {
        encode_flags_count(self.flags, self.values.len() as u32)
    }

    pub fn encode_value(&self) -> Bytes {
        let total: usize = self.values.iter().map(|v| 4 + v.len()).sum();
        let mut buf = BytesMut::with_capacity(total);
        for v in &self.values {
            buf.put_u32(v.len() as u32);
        }
        for v in &self.values {
            buf.put_slice(v);
        }
        buf.freeze()
    }

    pub fn decode(extras: &[u8], value: &Bytes) -> Result<Self> {
        let (flags, count) = decode_flags_count(extras)?;
        let count = count as usize;
        let table = count
            .checked_mul(4)
            .ok_or_else(|| CacheError::Payload(format!("element count {} overflows", count)))?;
        if value.len() < table {
            return Err(short("vlen table", table, value.len()));
        }
        let mut lens = &value[..table];
        let mut offset = table;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let len = lens.get_u32() as usize;
            let end = offset + len;
            if end > value.len() {
                return Err(short("element values", end, value.len()));
            }
            values.push(value.slice(offset..end));
            offset = end;
        }
        if offset != value.len() {
            return Err(CacheError::Payload(format!(
                "{} trailing bytes after elements",
                value.len() - offset
            )));
        }
        Ok(Self { flags, values })
    }
}

// =============================================================================
// B-tree batches
// =============================================================================

/// One b-tree element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtreeElement {
    pub bkey: i64,
    pub value: Bytes,
}

/// Elements returned by a b-tree read, in traversal order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BtreeBatch {
    pub flags: u32,
    pub elements: Vec<BtreeElement>,
}

impl BtreeBatch {
    pub fn encode_extras(&self) -> Bytes {
        encode_flags_count(self.flags, self.elements.len() as u32)
    }

    pub fn encode_value(&self) -> Bytes {
        let total: usize = self.elements.iter().map(|e| 12 + e.value.len()).sum();
        let mut buf = BytesMut::with_capacity(total);
        for e in &self.elements {
            buf.put_i64(e.bkey);
        }
        for e in &self.elements {
            buf.put_u32(e.value.len() as u32);
        }
        for e in &self.elements {
            buf.put_slice(&e.value);
        }
        buf.freeze()
    }

    pub fn decode(extras: &[u8], value: &Bytes) -> Result<Self> {
        let (flags, count) = decode_flags_count(extras)?;
        let count = count as usize;
        let table = count
            .checked_mul(12)
            .ok_or_else(|| CacheError::Payload(format!("element count {} overflows", count)))?;
        if value.len() < table {
            return Err(short("bkey/vlen tables", table, value.len()));
        }
        let mut bkeys = &value[..count * 8];
        let mut lens = &value[count * 8..table];
        let mut offset = table;
        let mut elements = Vec::with_capacity(count);
        for _ in 0..count {
            let bkey = bkeys.get_i64();
            let len = lens.get_u32() as usize;
            let end = offset + len;
            if end > value.len() {
                return Err(short("element values", end, value.len()));
            }
            elements.push(BtreeElement {
                bkey,
                value: value.slice(offset..end),
            });
            offset = end;
        }
        if offset != value.len() {
            return Err(CacheError::Payload(format!(
                "{} trailing bytes after elements",
                value.len() - offset
            )));
        }
        Ok(Self { flags, elements })
    }
}

// =============================================================================
// Attribute report
// =============================================================================

/// Size of an encoded attribute report
pub const ATTRIBUTE_REPORT_SIZE: usize = 28;

/// Attributes of an item as reported by GetAttr
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeReport {
    pub flags: u32,
    /// Remaining seconds; 0 = never expires, -1 = already expired
    pub exptime: i32,
    pub count: u32,
    pub maxcount: u32,
    pub maxbkeyrange: i64,
    pub item_type: ItemType,
    pub overflow_action: Option<OverflowAction>,
}

impl AttributeReport {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ATTRIBUTE_REPORT_SIZE);
        buf.put_u32(self.flags);
        buf.put_i32(self.exptime);
        buf.put_u32(self.count);
        buf.put_u32(self.maxcount);
        buf.put_i64(self.maxbkeyrange);
        buf.put_u8(self.item_type.code());
        buf.put_u8(self.overflow_action.map(OverflowAction::code).unwrap_or(0));
        buf.put_bytes(0, 2);
        buf.freeze()
    }

    pub fn decode(value: &[u8]) -> Result<Self> {
        if value.len() != ATTRIBUTE_REPORT_SIZE {
            return Err(short("attribute report", ATTRIBUTE_REPORT_SIZE, value.len()));
        }
        let mut buf = value;
        let flags = buf.get_u32();
        let exptime = buf.get_i32();
        let count = buf.get_u32();
        let maxcount = buf.get_u32();
        let maxbkeyrange = buf.get_i64();
        let type_code = buf.get_u8();
        let action_code = buf.get_u8();

        let item_type = ItemType::try_from(type_code)
            .map_err(|c| CacheError::Payload(format!("unknown item type {}", c)))?;
        let overflow_action = match action_code {
            0 => None,
            code => Some(
                OverflowAction::try_from(code)
                    .map_err(|c| CacheError::Payload(format!("unknown overflow action {}", c)))?,
            ),
        };

        Ok(Self {
            flags,
            exptime,
            count,
            maxcount,
            maxbkeyrange,
            item_type,
            overflow_action,
        })
    }
}
