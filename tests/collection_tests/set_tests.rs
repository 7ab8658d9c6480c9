//! Set Collection Tests
//!
//! Membership, overflow and attribute validation.

use std::collections::HashSet;

use bytes::Bytes;
use collcache::collection::{
    AttrUpdate, CollectionAttrs, CollectionError, ItemType, Limits, OverflowAction,
    SetCollection,
};

fn new_set(max_count: u32) -> SetCollection {
    let mut attrs = CollectionAttrs::with_defaults(ItemType::Set, &Limits::default());
    attrs.max_count = max_count;
    SetCollection::new(attrs)
}

fn as_set(values: Vec<Bytes>) -> HashSet<String> {
    values
        .into_iter()
        .map(|v| String::from_utf8_lossy(&v).into_owned())
        .collect()
}

// =============================================================================
// Membership Tests
// =============================================================================

#[test]
fn test_insert_delete_pop() {
    let mut set = new_set(4000);
    for i in 0..10 {
        set.insert(Bytes::from(format!("datum{}", i))).unwrap();
    }
    assert_eq!(
        set.insert(Bytes::from("datum3")),
        Err(CollectionError::ElementExists)
    );
    assert_eq!(set.len(), 10);

    for i in [1, 3, 5, 7, 9] {
        set.delete(format!("datum{}", i).as_bytes()).unwrap();
    }
    assert_eq!(set.delete(b"datum3"), Err(CollectionError::ElementNotFound));
    assert_eq!(set.delete(b"datum10"), Err(CollectionError::ElementNotFound));

    let popped = as_set(set.get(10, true).unwrap());
    let expected: HashSet<String> = [0, 2, 4, 6, 8]
        .iter()
        .map(|i| format!("datum{}", i))
        .collect();
    assert_eq!(popped, expected);
    assert!(set.is_empty());
}

#[test]
fn test_exists() {
    let mut set = new_set(10);
    set.insert(Bytes::from("a")).unwrap();

    assert!(set.exists(b"a"));
    assert!(!set.exists(b"b"));
}

#[test]
fn test_get_limits_count() {
    let mut set = new_set(10);
    for v in ["a", "b", "c", "d"] {
        set.insert(Bytes::from(v)).unwrap();
    }

    assert_eq!(set.get(2, false).unwrap().len(), 2);
    assert_eq!(set.get(0, false).unwrap().len(), 4);
    assert_eq!(set.len(), 4);
}

#[test]
fn test_get_on_empty_set() {
    let mut set = new_set(10);
    assert_eq!(set.get(0, false), Err(CollectionError::ElementNotFound));
}

// =============================================================================
// Overflow / Attribute Tests
// =============================================================================

#[test]
fn test_overflow_is_an_error() {
    let mut set = new_set(5);
    for i in 1..=5 {
        set.insert(Bytes::from(format!("datum{}", i))).unwrap();
    }
    assert_eq!(
        set.insert(Bytes::from("datum6")),
        Err(CollectionError::Overflow)
    );
    assert_eq!(set.len(), 5);
}

#[test]
fn test_trim_actions_rejected() {
    let limits = Limits::default();
    let mut attrs = CollectionAttrs::with_defaults(ItemType::Set, &limits);
    assert_eq!(attrs.overflow_action, OverflowAction::Error);

    for action in [
        OverflowAction::HeadTrim,
        OverflowAction::TailTrim,
        OverflowAction::SmallestTrim,
        OverflowAction::LargestTrim,
    ] {
        let update = AttrUpdate {
            overflow_action: action.code(),
            ..Default::default()
        };
        let err = attrs.apply(ItemType::Set, 0, &update, &limits).unwrap_err();
        assert!(matches!(err, CollectionError::BadValue(_)));
    }
}

#[test]
fn test_maxbkeyrange_rejected_on_set() {
    let limits = Limits::default();
    let mut attrs = CollectionAttrs::with_defaults(ItemType::Set, &limits);
    let update = AttrUpdate {
        max_bkey_range: Some(10),
        ..Default::default()
    };
    let err = attrs.apply(ItemType::Set, 0, &update, &limits).unwrap_err();
    assert!(matches!(err, CollectionError::BadAttribute(_)));
}

#[test]
fn test_max_count_update() {
    let limits = Limits::default();
    let mut attrs = CollectionAttrs::with_defaults(ItemType::Set, &limits);
    let update = AttrUpdate {
        max_count: Some(5),
        ..Default::default()
    };
    attrs.apply(ItemType::Set, 1, &update, &limits).unwrap();
    assert_eq!(attrs.max_count, 5);

    let shrink = AttrUpdate {
        max_count: Some(2),
        ..Default::default()
    };
    assert!(attrs.apply(ItemType::Set, 3, &shrink, &limits).is_err());
    assert_eq!(attrs.max_count, 5);
}
