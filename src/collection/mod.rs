//! Collection Module
//!
//! Server-side collections stored under a single cache key.
//!
//! ## Responsibilities
//! - Index and range resolution for lists
//! - Bkey scans and max-bkey-range windows for b-trees
//! - Overflow policies applied when a collection is full
//! - Attribute validation and max count normalization
//!
//! Every mutation validates first and mutates second, so a rejected call
//! leaves the collection untouched.

pub mod attr;
pub mod btree;
pub mod list;
pub mod set;

pub use attr::{AttrUpdate, CollectionAttrs};
pub use btree::{resolve_scan, BtreeCollection, Scan, ScanOrder};
pub use list::{resolve_insert_index, resolve_range, Direction, ListCollection, ResolvedRange};
pub use set::SetCollection;

use thiserror::Error;

use crate::protocol::Status;

/// Default max count when a create supplies 0
pub const DEFAULT_MAX_COUNT: u32 = 4000;

/// Hard upper bound for any collection's max count
pub const MAX_MAX_COUNT: u32 = 10000;

/// Type tag of a cached item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ItemType {
    Kv = 1,
    List = 2,
    Set = 3,
    Btree = 4,
}

impl ItemType {
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ItemType::Kv => "kv",
            ItemType::List => "list",
            ItemType::Set => "set",
            ItemType::Btree => "b+tree",
        }
    }

    pub fn is_collection(self) -> bool {
        self != ItemType::Kv
    }
}

impl TryFrom<u8> for ItemType {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, Self::Error> {
        match code {
            1 => Ok(ItemType::Kv),
            2 => Ok(ItemType::List),
            3 => Ok(ItemType::Set),
            4 => Ok(ItemType::Btree),
            other => Err(other),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Policy applied when a mutation would exceed a collection's capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OverflowAction {
    Error = 1,
    HeadTrim = 2,
    TailTrim = 3,
    SmallestTrim = 4,
    LargestTrim = 5,
}

impl OverflowAction {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The action a new collection of `item_type` starts with
    pub fn default_for(item_type: ItemType) -> Self {
        match item_type {
            ItemType::List => OverflowAction::TailTrim,
            ItemType::Btree => OverflowAction::SmallestTrim,
            ItemType::Set | ItemType::Kv => OverflowAction::Error,
        }
    }

    /// Whether this action can be applied to `item_type`
    pub fn is_valid_for(self, item_type: ItemType) -> bool {
        match item_type {
            ItemType::List => matches!(
                self,
                OverflowAction::Error | OverflowAction::HeadTrim | OverflowAction::TailTrim
            ),
            ItemType::Set => self == OverflowAction::Error,
            ItemType::Btree => matches!(
                self,
                OverflowAction::Error | OverflowAction::SmallestTrim | OverflowAction::LargestTrim
            ),
            ItemType::Kv => false,
        }
    }
}

impl TryFrom<u8> for OverflowAction {
    type Error = u8;

    fn try_from(code: u8) -> std::result::Result<Self, u8> {
        match code {
            1 => Ok(OverflowAction::Error),
            2 => Ok(OverflowAction::HeadTrim),
            3 => Ok(OverflowAction::TailTrim),
            4 => Ok(OverflowAction::SmallestTrim),
            5 => Ok(OverflowAction::LargestTrim),
            other => Err(other),
        }
    }
}

/// Limits that shape collection attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub default_max_count: u32,
    pub max_max_count: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            default_max_count: DEFAULT_MAX_COUNT,
            max_max_count: MAX_MAX_COUNT,
        }
    }
}

impl Limits {
    /// 0 selects the default; negative or oversized values clamp to the hard max
    pub fn normalize_max_count(&self, requested: i32) -> u32 {
        if requested == 0 {
            self.default_max_count.min(self.max_max_count)
        } else if requested < 0 || requested as u32 > self.max_max_count {
            self.max_max_count
        } else {
            requested as u32
        }
    }
}

/// Collection semantics failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollectionError {
    #[error("index out of range")]
    IndexOutOfRange,

    #[error("bkey out of range")]
    BkeyOutOfRange,

    #[error("collection is full")]
    Overflow,

    #[error("element already exists")]
    ElementExists,

    #[error("element not found")]
    ElementNotFound,

    #[error("bad value: {0}")]
    BadValue(String),

    #[error("bad attribute: {0}")]
    BadAttribute(String),
}

impl CollectionError {
    /// Wire status reported for this failure
    pub fn status(&self) -> Status {
        match self {
            CollectionError::IndexOutOfRange => Status::IndexOutOfRange,
            CollectionError::BkeyOutOfRange => Status::BkeyOutOfRange,
            CollectionError::Overflow => Status::Overflow,
            CollectionError::ElementExists => Status::ElementExists,
            CollectionError::ElementNotFound => Status::ElementNotFound,
            CollectionError::BadValue(_) => Status::BadValue,
            CollectionError::BadAttribute(_) => Status::BadAttribute,
        }
    }
}

impl From<CollectionError> for Status {
    fn from(err: CollectionError) -> Self {
        err.status()
    }
}

/// Result alias for collection semantics
pub type CollectionResult<T> = std::result::Result<T, CollectionError>;
