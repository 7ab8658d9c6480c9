//! B-tree Collection Tests
//!
//! Scans, maxcount eviction and max-bkey-range trimming.

use bytes::Bytes;
use collcache::collection::{
    resolve_scan, BtreeCollection, CollectionAttrs, CollectionError, ItemType, Limits,
    OverflowAction, ScanOrder,
};

fn tree_with(max_count: u32, action: OverflowAction, max_bkey_range: i64) -> BtreeCollection {
    let mut attrs = CollectionAttrs::with_defaults(ItemType::Btree, &Limits::default());
    attrs.max_count = max_count;
    attrs.overflow_action = action;
    attrs.max_bkey_range = max_bkey_range;
    BtreeCollection::new(attrs)
}

fn insert_all(tree: &mut BtreeCollection, bkeys: &[i64]) {
    for &bkey in bkeys {
        tree.insert(bkey, Bytes::from(format!("datum{}", bkey))).unwrap();
    }
}

fn bkeys(tree: &mut BtreeCollection) -> Vec<i64> {
    tree.get(i64::MIN, i64::MAX, 0, 0, false)
        .map(|found| found.into_iter().map(|(k, _)| k).collect())
        .unwrap_or_default()
}

// =============================================================================
// Scan Tests
// =============================================================================

#[test]
fn test_scan_direction() {
    let scan = resolve_scan(-5, 5);
    assert_eq!((scan.low, scan.high, scan.order), (-5, 5, ScanOrder::Ascending));

    let scan = resolve_scan(10010, 9000);
    assert_eq!((scan.low, scan.high, scan.order), (9000, 10010, ScanOrder::Descending));
}

#[test]
fn test_get_offset_count_and_order() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[0, 10, 20, 30, 40]);

    let found = tree.get(0, 40, 0, 0, false).unwrap();
    assert_eq!(found.len(), 5);
    assert_eq!(found[0], (0, Bytes::from("datum0")));

    let found = tree.get(40, 0, 1, 2, false).unwrap();
    let keys: Vec<i64> = found.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![30, 20]);

    assert_eq!(tree.get(0, 40, 5, 0, false), Err(CollectionError::ElementNotFound));
    assert_eq!(tree.get(41, 100, 0, 0, false), Err(CollectionError::ElementNotFound));
}

#[test]
fn test_descending_scan_mirrors_ascending() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[-20, -5, 0, 5, 10, 25, 40]);

    for (low, high) in [(-20, 40), (-6, 11), (0, 0), (i64::MIN, i64::MAX)] {
        let mut ascending = tree.get(low, high, 0, 0, false).unwrap();
        let descending = tree.get(high, low, 0, 0, false).unwrap();
        ascending.reverse();
        assert_eq!(descending, ascending, "range ({}, {})", low, high);
    }
}

#[test]
fn test_reads_without_delete_are_repeatable() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[1, 2, 3, 4, 5]);

    let first = tree.get(5, 1, 1, 3, false).unwrap();
    let second = tree.get(5, 1, 1, 3, false).unwrap();
    assert_eq!(first, second);
    assert_eq!(tree.count(1, 5), 5);
}

#[test]
fn test_delete_and_count() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[0, 10, 20, 30, 40]);

    assert_eq!(tree.count(0, 40), 5);
    assert_eq!(tree.delete(0, 20, 0), Ok(3));
    assert_eq!(tree.count(40, 20), 2);
    assert_eq!(tree.delete(0, 20, 0), Err(CollectionError::ElementNotFound));

    let popped = tree.get(20, 40, 0, 0, true).unwrap();
    assert_eq!(popped.len(), 2);
    assert!(tree.is_empty());
}

#[test]
fn test_delete_respects_count_in_scan_order() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[1, 2, 3, 4, 5]);

    assert_eq!(tree.delete(5, 1, 2), Ok(2));
    assert_eq!(bkeys(&mut tree), vec![1, 2, 3]);
}

#[test]
fn test_duplicate_bkey() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[10]);
    assert_eq!(
        tree.insert(10, Bytes::from("again")),
        Err(CollectionError::ElementExists)
    );
    insert_all(&mut tree, &[15, 20]);
    assert_eq!(tree.len(), 3);
}

#[test]
fn test_extreme_bkeys() {
    let mut tree = tree_with(4000, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[i64::MIN, 0, i64::MAX]);

    assert_eq!(tree.min_bkey(), Some(i64::MIN));
    assert_eq!(tree.max_bkey(), Some(i64::MAX));
    assert_eq!(tree.count(i64::MAX, i64::MIN), 3);
}

// =============================================================================
// Maxcount Overflow Tests
// =============================================================================

#[test]
fn test_smallest_trim_overflow() {
    let mut tree = tree_with(5, OverflowAction::SmallestTrim, 0);
    insert_all(&mut tree, &[10, 30, 50, 70, 90]);

    assert_eq!(tree.insert(80, Bytes::from("datum8")), Ok(vec![10]));
    assert_eq!(
        tree.insert(10, Bytes::from("datum1")),
        Err(CollectionError::BkeyOutOfRange)
    );
    assert_eq!(tree.insert(60, Bytes::from("datum6")), Ok(vec![30]));
    assert_eq!(bkeys(&mut tree), vec![50, 60, 70, 80, 90]);
}

#[test]
fn test_largest_trim_overflow() {
    let mut tree = tree_with(5, OverflowAction::LargestTrim, 0);
    insert_all(&mut tree, &[50, 60, 70, 80, 90]);

    assert_eq!(tree.insert(30, Bytes::from("datum3")), Ok(vec![90]));
    assert_eq!(tree.insert(40, Bytes::from("datum4")), Ok(vec![80]));
    assert_eq!(
        tree.insert(90, Bytes::from("datum9")),
        Err(CollectionError::BkeyOutOfRange)
    );
    assert_eq!(bkeys(&mut tree), vec![30, 40, 50, 60, 70]);
}

#[test]
fn test_largest_trim_evicts_largest_on_small_insert() {
    let mut tree = tree_with(5, OverflowAction::LargestTrim, 0);
    insert_all(&mut tree, &[10, 30, 50, 70, 90]);

    assert_eq!(tree.insert(20, Bytes::from("datum2")), Ok(vec![90]));
    assert_eq!(bkeys(&mut tree), vec![10, 20, 30, 50, 70]);
}

#[test]
fn test_error_overflow() {
    let mut tree = tree_with(5, OverflowAction::Error, 0);
    insert_all(&mut tree, &[30, 40, 50, 60, 70]);

    for bkey in [20, 80] {
        assert_eq!(
            tree.insert(bkey, Bytes::from("x")),
            Err(CollectionError::Overflow)
        );
    }
    assert_eq!(tree.len(), 5);
}

// =============================================================================
// Max Bkey Range Tests
// =============================================================================

#[test]
fn test_max_bkey_range_smallest_trim() {
    let mut tree = tree_with(1000, OverflowAction::SmallestTrim, 80);
    insert_all(&mut tree, &[10, 30, 50, 70, 90]);

    // span 10..90 is exactly the range
    assert_eq!(tree.insert(80, Bytes::from("datum8")), Ok(vec![]));
    assert_eq!(
        tree.insert(0, Bytes::from("datum0")),
        Err(CollectionError::BkeyOutOfRange)
    );
    assert_eq!(tree.insert(100, Bytes::from("datum10")), Ok(vec![10]));
    assert_eq!(bkeys(&mut tree), vec![30, 50, 70, 80, 90, 100]);
}

#[test]
fn test_max_bkey_range_largest_trim() {
    let mut tree = tree_with(1000, OverflowAction::LargestTrim, 80);
    insert_all(&mut tree, &[30, 50, 70, 80, 90, 100]);

    assert_eq!(tree.insert(40, Bytes::from("datum4")), Ok(vec![]));
    assert_eq!(
        tree.insert(120, Bytes::from("datum12")),
        Err(CollectionError::BkeyOutOfRange)
    );
    assert_eq!(tree.insert(10, Bytes::from("datum1")), Ok(vec![100]));
    assert_eq!(bkeys(&mut tree), vec![10, 30, 40, 50, 70, 80, 90]);
}

#[test]
fn test_max_bkey_range_disabled() {
    let mut tree = tree_with(1000, OverflowAction::LargestTrim, 80);
    insert_all(&mut tree, &[10, 30, 40, 50, 70, 80, 90]);
    tree.attrs_mut().max_bkey_range = 0;

    insert_all(&mut tree, &[0, 60, 120]);
    assert_eq!(
        bkeys(&mut tree),
        vec![0, 10, 30, 40, 50, 60, 70, 80, 90, 120]
    );
}

#[test]
fn test_max_bkey_range_with_error_action() {
    let mut tree = tree_with(1000, OverflowAction::Error, 10);
    insert_all(&mut tree, &[0, 5]);
    assert_eq!(
        tree.insert(20, Bytes::from("x")),
        Err(CollectionError::BkeyOutOfRange)
    );
}

#[test]
fn test_range_trim_applies_before_count_check() {
    let mut tree = tree_with(3, OverflowAction::SmallestTrim, 20);
    insert_all(&mut tree, &[0, 10, 20]);

    // the window drops 0, which frees a slot, so no count eviction happens
    assert_eq!(tree.insert(25, Bytes::from("x")), Ok(vec![0]));
    assert_eq!(bkeys(&mut tree), vec![10, 20, 25]);
}
