//! List collections
//!
//! Positional lists addressed by signed indices. Negative indices count
//! from the end: for ranges `-1` is the last element, for inserts `-1`
//! is the position after the last element.

use std::collections::VecDeque;

use bytes::Bytes;

use super::{CollectionAttrs, CollectionError, CollectionResult, OverflowAction};

/// Traversal direction of a resolved range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// An inclusive range of positions, enumerated from `start` towards `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: usize,
    pub end: usize,
    pub direction: Direction,
}

impl ResolvedRange {
    pub fn len(&self) -> usize {
        self.start.abs_diff(self.end) + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Lowest and highest position covered
    pub fn bounds(&self) -> (usize, usize) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Positions in traversal order
    pub fn positions(&self) -> Box<dyn Iterator<Item = usize>> {
        match self.direction {
            Direction::Forward => Box::new(self.start..=self.end),
            Direction::Backward => Box::new((self.end..=self.start).rev()),
        }
    }
}

/// Map an insert index onto a position in `[0, len]`
///
/// Valid indices are `[-(len + 1), len]`; `-k` maps to `len + 1 - k`.
pub fn resolve_insert_index(len: usize, index: i32) -> CollectionResult<usize> {
    let len = len as i64;
    let index = index as i64;
    let pos = if index >= 0 { index } else { len + 1 + index };
    if pos < 0 || pos > len {
        return Err(CollectionError::IndexOutOfRange);
    }
    Ok(pos as usize)
}

/// Resolve a signed, inclusive `from..to` range against a list of `len`
///
/// `from > to` (after resolving negatives) walks backwards. Endpoints past
/// either end are clamped as long as the range overlaps the list.
pub fn resolve_range(len: usize, from: i32, to: i32) -> CollectionResult<ResolvedRange> {
    if len == 0 {
        return Err(CollectionError::IndexOutOfRange);
    }
    let n = len as i64;
    let from = if from < 0 { n + from as i64 } else { from as i64 };
    let to = if to < 0 { n + to as i64 } else { to as i64 };

    if from <= to {
        if from >= n || to < 0 {
            return Err(CollectionError::IndexOutOfRange);
        }
        Ok(ResolvedRange {
            start: from.max(0) as usize,
            end: to.min(n - 1) as usize,
            direction: Direction::Forward,
        })
    } else {
        if to >= n || from < 0 {
            return Err(CollectionError::IndexOutOfRange);
        }
        Ok(ResolvedRange {
            start: from.min(n - 1) as usize,
            end: to.max(0) as usize,
            direction: Direction::Backward,
        })
    }
}

/// An ordered list of opaque elements
#[derive(Debug, Clone)]
pub struct ListCollection {
    items: VecDeque<Bytes>,
    attrs: CollectionAttrs,
}

impl ListCollection {
    pub fn new(attrs: CollectionAttrs) -> Self {
        Self {
            items: VecDeque::new(),
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

    /// All elements, head first
    pub fn iter(&self) -> impl Iterator<Item = &Bytes> {
        self.items.iter()
    }

    /// Insert `value` at a signed index, applying the overflow action when full
    ///
    /// When a trim is needed the index is resolved against the trimmed list.
    /// Tail-trim drops the tail unless the value is going there, in which
    /// case the head is dropped; head-trim is the mirror image.
    pub fn insert(&mut self, index: i32, value: Bytes) -> CollectionResult<()> {
        let len = self.items.len();
        if len < self.attrs.max_count as usize {
            let pos = resolve_insert_index(len, index)?;
            self.items.insert(pos, value);
            return Ok(());
        }

        match self.attrs.overflow_action {
            OverflowAction::HeadTrim | OverflowAction::TailTrim if len > 0 => {
                let trimmed = len - 1;
                let pos = resolve_insert_index(trimmed, index)?;
                let drop_head = match self.attrs.overflow_action {
                    OverflowAction::TailTrim => pos == trimmed,
                    _ => pos != 0,
                };
                if drop_head {
                    self.items.pop_front();
                } else {
                    self.items.pop_back();
                }
                self.items.insert(pos, value);
                Ok(())
            }
            _ => {
                resolve_insert_index(len, index)?;
                Err(CollectionError::Overflow)
            }
        }
    }

    /// Elements in the resolved range, in traversal order
    ///
    /// With `delete` the returned elements are removed from the list.
    pub fn get(&mut self, from: i32, to: i32, delete: bool) -> CollectionResult<Vec<Bytes>> {
        let range = resolve_range(self.items.len(), from, to)?;
        let values: Vec<Bytes> = range.positions().map(|i| self.items[i].clone()).collect();
        if delete {
            self.remove_range(&range);
        }
        Ok(values)
    }

    /// Remove the resolved range, returning how many elements went away
    pub fn delete(&mut self, from: i32, to: i32) -> CollectionResult<usize> {
        let range = resolve_range(self.items.len(), from, to)?;
        Ok(self.remove_range(&range))
    }

    fn remove_range(&mut self, range: &ResolvedRange) -> usize {
        let (low, high) = range.bounds();
        self.items.drain(low..=high).count()
    }
}
