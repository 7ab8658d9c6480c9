//! Collection attributes
//!
//! Creation-time attributes and validated attribute updates.

use super::{CollectionError, CollectionResult, ItemType, Limits, OverflowAction};

/// Capacity attributes of a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionAttrs {
    pub max_count: u32,
    pub overflow_action: OverflowAction,
    /// Maximum distance between the smallest and largest bkey; 0 disables it
    pub max_bkey_range: i64,
}

impl CollectionAttrs {
    /// Attributes for a new collection
    ///
    /// `overflow_action` 0 selects the type default.
    pub fn new(
        item_type: ItemType,
        max_count: i32,
        overflow_action: u8,
        limits: &Limits,
    ) -> CollectionResult<Self> {
        let overflow_action = match overflow_action {
            0 => OverflowAction::default_for(item_type),
            code => parse_action(item_type, code)?,
        };
        Ok(Self {
            max_count: limits.normalize_max_count(max_count),
            overflow_action,
            max_bkey_range: 0,
        })
    }

    /// Attributes for a new collection with the type defaults
    pub fn with_defaults(item_type: ItemType, limits: &Limits) -> Self {
        Self {
            max_count: limits.normalize_max_count(0),
            overflow_action: OverflowAction::default_for(item_type),
            max_bkey_range: 0,
        }
    }

    /// Validate an update against this collection and apply it
    ///
    /// Nothing changes unless every present field is acceptable.
    pub fn apply(
        &mut self,
        item_type: ItemType,
        count: usize,
        update: &AttrUpdate,
        limits: &Limits,
    ) -> CollectionResult<()> {
        update.check_item_type(item_type)?;

        let overflow_action = match update.overflow_action {
            0 => self.overflow_action,
            code => parse_action(item_type, code)?,
        };

        let max_count = match update.max_count {
            Some(requested) => {
                let normalized = limits.normalize_max_count(requested);
                if (normalized as usize) < count {
                    return Err(CollectionError::BadValue(format!(
                        "maxcount {} is below the current count {}",
                        normalized, count
                    )));
                }
                normalized
            }
            None => self.max_count,
        };

        let max_bkey_range = match update.max_bkey_range {
            Some(range) if range < 0 => {
                return Err(CollectionError::BadValue(format!(
                    "maxbkeyrange {} is negative",
                    range
                )))
            }
            Some(range) => range,
            None => self.max_bkey_range,
        };

        self.overflow_action = overflow_action;
        self.max_count = max_count;
        self.max_bkey_range = max_bkey_range;
        Ok(())
    }
}

fn parse_action(item_type: ItemType, code: u8) -> CollectionResult<OverflowAction> {
    match OverflowAction::try_from(code) {
        Ok(action) if action.is_valid_for(item_type) => Ok(action),
        Ok(action) => Err(CollectionError::BadValue(format!(
            "overflow action {:?} is not valid for a {}",
            action, item_type
        ))),
        Err(code) => Err(CollectionError::BadValue(format!(
            "unknown overflow action {}",
            code
        ))),
    }
}

/// A SetAttr request; absent fields stay unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttrUpdate {
    pub exptime: Option<i32>,
    pub max_count: Option<i32>,
    pub max_bkey_range: Option<i64>,
    /// 0 leaves the action unchanged
    pub overflow_action: u8,
}

impl AttrUpdate {
    /// Whether any field other than the expiration is present
    pub fn touches_collection(&self) -> bool {
        self.max_count.is_some() || self.max_bkey_range.is_some() || self.overflow_action != 0
    }

    /// Reject fields the item type does not carry
    pub fn check_item_type(&self, item_type: ItemType) -> CollectionResult<()> {
        match item_type {
            ItemType::Kv if self.touches_collection() => Err(CollectionError::BadAttribute(
                "only the expiration can be set on a kv item".to_string(),
            )),
            ItemType::List | ItemType::Set if self.max_bkey_range.is_some() => {
                Err(CollectionError::BadAttribute(format!(
                    "maxbkeyrange does not apply to a {}",
                    item_type
                )))
            }
            _ => Ok(()),
        }
    }
}
