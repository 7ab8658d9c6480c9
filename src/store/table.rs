//! Item table
//!
//! HashMap-based table. Callers serialize access with an outer lock.

use std::collections::HashMap;

use bytes::Bytes;

use super::Item;
use crate::clock::Tick;
use crate::collection::ItemType;

/// All live items, plus a pending delayed flush
#[derive(Debug, Default)]
pub struct ItemTable {
    items: HashMap<Bytes, Item>,
    last_cas: u64,
    /// Items last touched before this deadline vanish once it passes
    flush_deadline: Option<Tick>,
}

impl ItemTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Next CAS value
    pub fn next_cas(&mut self) -> u64 {
        self.last_cas += 1;
        self.last_cas
    }

    fn apply_due_flush(&mut self, now: Tick) {
        if let Some(deadline) = self.flush_deadline {
            if now.is_at_or_after(deadline) {
                self.items.retain(|_, item| item.touched_at >= deadline);
                self.flush_deadline = None;
            }
        }
    }

    /// Look up a live item, removing it first if it has expired
    pub fn get(&mut self, key: &[u8], now: Tick) -> Option<&Item> {
        self.get_mut(key, now).map(|item| &*item)
    }

    /// Mutable variant of [`ItemTable::get`]
    pub fn get_mut(&mut self, key: &[u8], now: Tick) -> Option<&mut Item> {
        self.apply_due_flush(now);
        let expired = self.items.get(key).map(|item| item.is_expired(now))?;
        if expired {
            self.items.remove(key);
            return None;
        }
        self.items.get_mut(key)
    }

    /// Whether a live item exists under `key`
    pub fn contains(&mut self, key: &[u8], now: Tick) -> bool {
        self.get(key, now).is_some()
    }

    /// Store an item, replacing whatever was there
    pub fn insert(&mut self, key: Bytes, item: Item) {
        self.items.insert(key, item);
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Item> {
        self.items.remove(key)
    }

    /// Invalidate every item now, or every item not touched again before `deadline`
    pub fn flush(&mut self, deadline: Option<Tick>, now: Tick) {
        match deadline {
            Some(deadline) if !now.is_at_or_after(deadline) => {
                self.flush_deadline = Some(deadline);
            }
            _ => {
                self.items.clear();
                self.flush_deadline = None;
            }
        }
    }

    /// Number of stored items, including ones not yet lazily expired
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of stored items of a given type
    pub fn count_of(&self, item_type: ItemType) -> usize {
        self.items
            .values()
            .filter(|item| item.item_type() == item_type)
            .count()
    }
}
