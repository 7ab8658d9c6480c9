//! Set collections
//!
//! Unordered collections of unique elements. The only overflow action a
//! set supports is `Error`.

use std::collections::HashSet;

use bytes::Bytes;

use super::{CollectionAttrs, CollectionError, CollectionResult};

/// An unordered set of unique opaque elements
#[derive(Debug, Clone)]
pub struct SetCollection {
    items: HashSet<Bytes>,
    attrs: CollectionAttrs,
}

impl SetCollection {
    pub fn new(attrs: CollectionAttrs) -> Self {
        Self {
            items: HashSet::new(),
            attrs,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn attrs(&self) -> &CollectionAttrs {
        &self.attrs
    }

    pub fn attrs_mut(&mut self) -> &mut CollectionAttrs {
        &mut self.attrs
    }

    pub fn insert(&mut self, value: Bytes) -> CollectionResult<()> {
        if self.items.contains(&value) {
            return Err(CollectionError::ElementExists);
        }
        if self.items.len() >= self.attrs.max_count as usize {
            return Err(CollectionError::Overflow);
        }
        self.items.insert(value);
        Ok(())
    }

    pub fn delete(&mut self, value: &[u8]) -> CollectionResult<()> {
        if self.items.remove(value) {
            Ok(())
        } else {
            Err(CollectionError::ElementNotFound)
        }
    }

    pub fn exists(&self, value: &[u8]) -> bool {
        self.items.contains(value)
    }

    /// Up to `count` elements (0 = all), optionally removing them
    pub fn get(&mut self, count: u32, delete: bool) -> CollectionResult<Vec<Bytes>> {
        if self.items.is_empty() {
            return Err(CollectionError::ElementNotFound);
        }
        let limit = if count == 0 {
            self.items.len()
        } else {
            count as usize
        };
        let values: Vec<Bytes> = self.items.iter().take(limit).cloned().collect();
        if delete {
            for v in &values {
                self.items.remove(v);
            }
        }
        Ok(values)
    }
}
