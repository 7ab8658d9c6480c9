//! Cached items

use bytes::Bytes;

use crate::clock::Tick;
use crate::collection::{
    BtreeCollection, CollectionAttrs, ItemType, ListCollection, SetCollection,
};

/// Largest exptime interpreted as relative seconds (30 days)
pub const RELATIVE_EXPTIME_LIMIT: i64 = 60 * 60 * 24 * 30;

/// Turn a wire exptime into an absolute deadline
///
/// Returns `None` for items that never expire.
pub fn resolve_exptime(exptime: i64, now: Tick) -> Option<Tick> {
    if exptime == 0 {
        None
    } else if exptime < 0 {
        Some(Tick::new(0))
    } else if exptime <= RELATIVE_EXPTIME_LIMIT {
        Some(now.add_secs(exptime as u64))
    } else {
        Some(Tick::from_secs(exptime as u64))
    }
}

/// Payload of an item
#[derive(Debug, Clone)]
pub enum Value {
    Kv(Bytes),
    List(ListCollection),
    Set(SetCollection),
    Btree(BtreeCollection),
}

impl Value {
    pub fn item_type(&self) -> ItemType {
        match self {
            Value::Kv(_) => ItemType::Kv,
            Value::List(_) => ItemType::List,
            Value::Set(_) => ItemType::Set,
            Value::Btree(_) => ItemType::Btree,
        }
    }

    /// Element count; 0 for plain values
    pub fn count(&self) -> usize {
        match self {
            Value::Kv(_) => 0,
            Value::List(list) => list.len(),
            Value::Set(set) => set.len(),
            Value::Btree(tree) => tree.len(),
        }
    }

    pub fn attrs(&self) -> Option<&CollectionAttrs> {
        match self {
            Value::Kv(_) => None,
            Value::List(list) => Some(list.attrs()),
            Value::Set(set) => Some(set.attrs()),
            Value::Btree(tree) => Some(tree.attrs()),
        }
    }

    pub fn attrs_mut(&mut self) -> Option<&mut CollectionAttrs> {
        match self {
            Value::Kv(_) => None,
            Value::List(list) => Some(list.attrs_mut()),
            Value::Set(set) => Some(set.attrs_mut()),
            Value::Btree(tree) => Some(tree.attrs_mut()),
        }
    }

    pub fn as_kv(&self) -> Option<&Bytes> {
        match self {
            Value::Kv(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut ListCollection> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_set_mut(&mut self) -> Option<&mut SetCollection> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    pub fn as_btree_mut(&mut self) -> Option<&mut BtreeCollection> {
        match self {
            Value::Btree(tree) => Some(tree),
            _ => None,
        }
    }
}

/// A cached item
#[derive(Debug, Clone)]
pub struct Item {
    pub flags: u32,
    /// Absolute deadline, `None` = never expires
    pub expires_at: Option<Tick>,
    pub cas: u64,
    /// Time of the last mutation
    pub touched_at: Tick,
    pub value: Value,
}

impl Item {
    pub fn new(flags: u32, expires_at: Option<Tick>, value: Value, now: Tick) -> Self {
        Self {
            flags,
            expires_at,
            cas: 0,
            touched_at: now,
            value,
        }
    }

    pub fn item_type(&self) -> ItemType {
        self.value.item_type()
    }

    pub fn is_expired(&self, now: Tick) -> bool {
        self.expires_at
            .map(|deadline| now.is_at_or_after(deadline))
            .unwrap_or(false)
    }

    /// Record a mutation
    pub fn stamp(&mut self, cas: u64, now: Tick) {
        self.cas = cas;
        self.touched_at = now;
    }

    /// Remaining lifetime in whole seconds: 0 = never, -1 = already expired
    pub fn remaining_secs(&self, now: Tick) -> i32 {
        match self.expires_at {
            None => 0,
            Some(deadline) if now.is_at_or_after(deadline) => -1,
            Some(deadline) => {
                let secs = now.ms_until(deadline).div_ceil(1000);
                secs.min(i32::MAX as u64) as i32
            }
        }
    }
}
