//! B-tree collections
//!
//! Elements ordered by a signed 64-bit bkey.
//!
//! ## Insert policy
//! ```text
//! 1. duplicate bkey                      -> ElementExists
//! 2. maxbkeyrange window (if non-zero)   -> reject or trim outside the window
//! 3. maxcount                            -> reject or evict min / max
//! ```
//! Both capacity checks are resolved before the tree is touched.

use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;

use super::{CollectionAttrs, CollectionError, CollectionResult, OverflowAction};

/// Scan order over a bkey interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    Ascending,
    Descending,
}

/// A closed bkey interval and the order it is walked in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    pub low: i64,
    pub high: i64,
    pub order: ScanOrder,
}

/// Ascending when `from <= to`, otherwise descending over `[to, from]`
pub fn resolve_scan(from: i64, to: i64) -> Scan {
    if from <= to {
        Scan {
            low: from,
            high: to,
            order: ScanOrder::Ascending,
        }
    } else {
        Scan {
            low: to,
            high: from,
            order: ScanOrder::Descending,
        }
    }
}

/// Trim planned by an insert, applied only once every check has passed
#[derive(Debug, Clone, Copy)]
enum Trim {
    Below(i64),
    Above(i64),
}

/// An ordered map from bkey to opaque element
#[derive(Debug, Clone)]
pub struct BtreeCollection {
    items: BTreeMap<i64, Bytes>,
    attrs: CollectionAttrs,
}

impl BtreeCollection {
    pub fn new(attrs: CollectionAttrs) -> Self {
        Self {
            items: BTreeMap::new(),
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

    pub fn min_bkey(&self) -> Option<i64> {
        self.items.keys().next().copied()
    }

    pub fn max_bkey(&self) -> Option<i64> {
        self.items.keys().next_back().copied()
    }

    /// Insert an element, returning the bkeys trimmed to make room
    pub fn insert(&mut self, bkey: i64, value: Bytes) -> CollectionResult<Vec<i64>> {
        if self.items.contains_key(&bkey) {
            return Err(CollectionError::ElementExists);
        }

        let action = self.attrs.overflow_action;
        let range_trim = self.plan_range_trim(bkey, action)?;

        let remaining = match range_trim {
            Some(Trim::Below(threshold)) => self.items.range(threshold..).count(),
            Some(Trim::Above(threshold)) => self.items.range(..=threshold).count(),
            None => self.items.len(),
        };

        let mut evict = None;
        if remaining >= self.attrs.max_count as usize {
            let (lo, hi) = match range_trim {
                Some(Trim::Below(threshold)) => {
                    (self.first_at_or_above(threshold), self.max_bkey())
                }
                Some(Trim::Above(threshold)) => (self.min_bkey(), self.last_at_or_below(threshold)),
                None => (self.min_bkey(), self.max_bkey()),
            };
            evict = match (action, lo, hi) {
                (OverflowAction::SmallestTrim, Some(lo), _) => {
                    if bkey < lo {
                        return Err(CollectionError::BkeyOutOfRange);
                    }
                    Some(lo)
                }
                (OverflowAction::LargestTrim, _, Some(hi)) => {
                    if bkey > hi {
                        return Err(CollectionError::BkeyOutOfRange);
                    }
                    Some(hi)
                }
                _ => return Err(CollectionError::Overflow),
            };
        }

        let mut trimmed = Vec::new();
        match range_trim {
            Some(Trim::Below(threshold)) => {
                let kept = self.items.split_off(&threshold);
                trimmed.extend(self.items.keys().copied());
                self.items = kept;
            }
            Some(Trim::Above(threshold)) => {
                if let Some(first_above) = threshold.checked_add(1) {
                    let removed = self.items.split_off(&first_above);
                    trimmed.extend(removed.keys().copied());
                }
            }
            None => {}
        }
        if let Some(victim) = evict {
            self.items.remove(&victim);
            trimmed.push(victim);
        }

        self.items.insert(bkey, value);
        Ok(trimmed)
    }

    fn plan_range_trim(&self, bkey: i64, action: OverflowAction) -> CollectionResult<Option<Trim>> {
        let range = self.attrs.max_bkey_range;
        if range <= 0 {
            return Ok(None);
        }
        let (Some(min), Some(max)) = (self.min_bkey(), self.max_bkey()) else {
            return Ok(None);
        };
        let lo = min.min(bkey) as i128;
        let hi = max.max(bkey) as i128;
        let range = range as i128;
        if hi - lo <= range {
            return Ok(None);
        }

        match action {
            OverflowAction::SmallestTrim => {
                let threshold = hi - range;
                if (bkey as i128) < threshold {
                    return Err(CollectionError::BkeyOutOfRange);
                }
                Ok(Some(Trim::Below(threshold as i64)))
            }
            OverflowAction::LargestTrim => {
                let threshold = lo + range;
                if (bkey as i128) > threshold {
                    return Err(CollectionError::BkeyOutOfRange);
                }
                Ok(Some(Trim::Above(threshold as i64)))
            }
            _ => Err(CollectionError::BkeyOutOfRange),
        }
    }

    fn first_at_or_above(&self, bkey: i64) -> Option<i64> {
        self.items.range(bkey..).next().map(|(k, _)| *k)
    }

    fn last_at_or_below(&self, bkey: i64) -> Option<i64> {
        self.items.range(..=bkey).next_back().map(|(k, _)| *k)
    }

    fn scan_keys(&self, scan: Scan) -> Box<dyn Iterator<Item = i64> + '_> {
        let range = self
            .items
            .range((Bound::Included(scan.low), Bound::Included(scan.high)))
            .map(|(k, _)| *k);
        match scan.order {
            ScanOrder::Ascending => Box::new(range),
            ScanOrder::Descending => Box::new(range.rev()),
        }
    }

    /// Elements between `from` and `to` in scan order
    ///
    /// Skips `offset` matches, then takes up to `count` (0 = unbounded).
    pub fn get(
        &mut self,
        from: i64,
        to: i64,
        offset: u32,
        count: u32,
        delete: bool,
    ) -> CollectionResult<Vec<(i64, Bytes)>> {
        let scan = resolve_scan(from, to);
        let limit = if count == 0 { usize::MAX } else { count as usize };
        let keys: Vec<i64> = self
            .scan_keys(scan)
            .skip(offset as usize)
            .take(limit)
            .collect();
        if keys.is_empty() {
            return Err(CollectionError::ElementNotFound);
        }

        let mut elements = Vec::with_capacity(keys.len());
        for bkey in keys {
            let value = if delete {
                self.items.remove(&bkey)
            } else {
                self.items.get(&bkey).cloned()
            };
            if let Some(value) = value {
                elements.push((bkey, value));
            }
        }
        Ok(elements)
    }

    /// Delete up to `count` elements (0 = unbounded) in scan order
    pub fn delete(&mut self, from: i64, to: i64, count: u32) -> CollectionResult<usize> {
        let scan = resolve_scan(from, to);
        let limit = if count == 0 { usize::MAX } else { count as usize };
        let keys: Vec<i64> = self.scan_keys(scan).take(limit).collect();
        if keys.is_empty() {
            return Err(CollectionError::ElementNotFound);
        }
        for bkey in &keys {
            self.items.remove(bkey);
        }
        Ok(keys.len())
    }

    /// Number of stored bkeys in the closed interval
    pub fn count(&self, from: i64, to: i64) -> usize {
        let scan = resolve_scan(from, to);
        self.items.range(scan.low..=scan.high).count()
    }
}
