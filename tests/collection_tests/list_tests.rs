//! List Collection Tests
//!
//! Index resolution, range reads and overflow trimming.

use bytes::Bytes;
use collcache::collection::{
    resolve_insert_index, resolve_range, CollectionAttrs, CollectionError, Direction, ItemType,
    Limits, ListCollection, OverflowAction,
};

fn list_with(max_count: u32, action: OverflowAction) -> ListCollection {
    let mut attrs = CollectionAttrs::with_defaults(ItemType::List, &Limits::default());
    attrs.max_count = max_count;
    attrs.overflow_action = action;
    ListCollection::new(attrs)
}

fn contents(list: &ListCollection) -> Vec<String> {
    list.iter()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .collect()
}

fn strings(values: &[Bytes]) -> Vec<String> {
    values
        .iter()
        .map(|v| String::from_utf8_lossy(v).into_owned())
        .collect()
}

fn fill(list: &mut ListCollection, values: &[&str]) {
    for v in values {
        list.insert(-1, Bytes::copy_from_slice(v.as_bytes())).unwrap();
    }
}

// =============================================================================
// Index Resolution Tests
// =============================================================================

#[test]
fn test_insert_index_resolution() {
    assert_eq!(resolve_insert_index(5, 0), Ok(0));
    assert_eq!(resolve_insert_index(5, 5), Ok(5));
    assert_eq!(resolve_insert_index(5, -1), Ok(5));
    assert_eq!(resolve_insert_index(5, -6), Ok(0));
    assert_eq!(resolve_insert_index(5, 6), Err(CollectionError::IndexOutOfRange));
    assert_eq!(resolve_insert_index(5, -7), Err(CollectionError::IndexOutOfRange));
}

#[test]
fn test_range_resolution_clamps() {
    let range = resolve_range(5, 2, 100).unwrap();
    assert_eq!((range.start, range.end, range.direction), (2, 4, Direction::Forward));

    let range = resolve_range(5, 9, -2).unwrap();
    assert_eq!((range.start, range.end, range.direction), (4, 3, Direction::Backward));

    let range = resolve_range(5, -100, 1).unwrap();
    assert_eq!((range.start, range.end), (0, 1));
}

#[test]
fn test_range_resolution_out_of_range() {
    assert_eq!(resolve_range(5, 7, 9), Err(CollectionError::IndexOutOfRange));
    assert_eq!(resolve_range(5, -9, -8), Err(CollectionError::IndexOutOfRange));
    assert_eq!(resolve_range(2, 4, 5), Err(CollectionError::IndexOutOfRange));
    assert_eq!(resolve_range(2, -5, -7), Err(CollectionError::IndexOutOfRange));
}

// =============================================================================
// Insert / Get / Delete Tests
// =============================================================================

#[test]
fn test_insert_from_both_ends() {
    let mut list = list_with(4000, OverflowAction::TailTrim);
    let inserts = [
        (0, "datum0"),
        (-1, "datum9"),
        (1, "datum1"),
        (-2, "datum8"),
        (2, "datum2"),
        (-3, "datum7"),
        (3, "datum3"),
        (-4, "datum6"),
        (4, "datum4"),
        (-5, "datum5"),
    ];
    for (index, value) in inserts {
        list.insert(index, Bytes::from(value)).unwrap();
    }

    let expected: Vec<String> = (0..10).map(|i| format!("datum{}", i)).collect();
    assert_eq!(contents(&list), expected);
}

#[test]
fn test_head_inserts_reverse_order() {
    let mut list = list_with(4000, OverflowAction::TailTrim);
    for i in 0..5 {
        list.insert(0, Bytes::from(format!("datum{}", i))).unwrap();
    }
    assert_eq!(
        contents(&list),
        vec!["datum4", "datum3", "datum2", "datum1", "datum0"]
    );
}

#[test]
fn test_delete_and_pop() {
    let mut list = list_with(4000, OverflowAction::TailTrim);
    let values: Vec<String> = (0..10).map(|i| format!("datum{}", i)).collect();
    let refs: Vec<&str> = values.iter().map(String::as_str).collect();
    fill(&mut list, &refs);

    assert_eq!(list.delete(8, -3), Ok(2));
    assert_eq!(list.delete(1, 3), Ok(3));
    assert_eq!(list.delete(7, 9), Err(CollectionError::IndexOutOfRange));
    assert_eq!(list.delete(-9, -8), Err(CollectionError::IndexOutOfRange));
    assert_eq!(
        contents(&list),
        vec!["datum0", "datum4", "datum5", "datum6", "datum9"]
    );

    // backward pop
    let popped = list.get(9, -2, true).unwrap();
    assert_eq!(strings(&popped), vec!["datum9", "datum6"]);
    let popped = list.get(1, 1, true).unwrap();
    assert_eq!(strings(&popped), vec!["datum4"]);
    assert_eq!(list.get(4, 5, true), Err(CollectionError::IndexOutOfRange));
    assert_eq!(list.get(-5, -7, true), Err(CollectionError::IndexOutOfRange));

    assert_eq!(contents(&list), vec!["datum0", "datum5"]);
    assert_eq!(list.delete(0, -1), Ok(2));
    assert!(list.is_empty());
}

#[test]
fn test_get_without_delete_keeps_elements() {
    let mut list = list_with(10, OverflowAction::TailTrim);
    fill(&mut list, &["a", "b", "c"]);

    let values = list.get(-1, 0, false).unwrap();
    assert_eq!(strings(&values), vec!["c", "b", "a"]);
    assert_eq!(list.len(), 3);
}

#[test]
fn test_reads_without_delete_are_repeatable() {
    let mut list = list_with(10, OverflowAction::TailTrim);
    fill(&mut list, &["a", "b", "c", "d", "e"]);

    for (from, to) in [(0, -1), (-1, 0), (1, 3), (-2, -4), (2, 2)] {
        let first = list.get(from, to, false).unwrap();
        let second = list.get(from, to, false).unwrap();
        assert_eq!(first, second, "range ({}, {})", from, to);
    }
    assert_eq!(contents(&list), vec!["a", "b", "c", "d", "e"]);
}

#[test]
fn test_insert_out_of_range() {
    let mut list = list_with(10, OverflowAction::TailTrim);
    list.insert(0, Bytes::from("datum0")).unwrap();

    assert_eq!(
        list.insert(2, Bytes::from("datum2")),
        Err(CollectionError::IndexOutOfRange)
    );
    assert_eq!(
        list.insert(-3, Bytes::from("datum2")),
        Err(CollectionError::IndexOutOfRange)
    );
    list.insert(1, Bytes::from("datum1")).unwrap();
    assert_eq!(contents(&list), vec!["datum0", "datum1"]);
}

// =============================================================================
// Overflow Tests
// =============================================================================

#[test]
fn test_tail_trim_overflow() {
    let mut list = list_with(5, OverflowAction::TailTrim);
    fill(&mut list, &["datum1", "datum2", "datum3", "datum4", "datum5"]);

    // indices are resolved against the list after one element is trimmed
    assert_eq!(
        list.insert(5, Bytes::from("datum6")),
        Err(CollectionError::IndexOutOfRange)
    );
    assert_eq!(
        list.insert(-6, Bytes::from("datum6")),
        Err(CollectionError::IndexOutOfRange)
    );

    list.insert(2, Bytes::from("datum0")).unwrap();
    list.insert(0, Bytes::from("datum6")).unwrap();
    list.insert(0, Bytes::from("datum7")).unwrap();
    list.insert(-1, Bytes::from("datum8")).unwrap();
    assert_eq!(
        contents(&list),
        vec!["datum6", "datum1", "datum2", "datum0", "datum8"]
    );

    // inserting at the tail drops the head instead
    list.insert(4, Bytes::from("datum9")).unwrap();
    assert_eq!(
        contents(&list),
        vec!["datum1", "datum2", "datum0", "datum8", "datum9"]
    );

    list.insert(-5, Bytes::from("datum3")).unwrap();
    assert_eq!(
        contents(&list),
        vec!["datum3", "datum1", "datum2", "datum0", "datum8"]
    );
}

#[test]
fn test_head_trim_overflow() {
    let mut list = list_with(5, OverflowAction::HeadTrim);
    fill(&mut list, &["datum3", "datum1", "datum2", "datum0", "datum8"]);

    list.insert(2, Bytes::from("datums")).unwrap();
    assert_eq!(
        contents(&list),
        vec!["datum1", "datum2", "datums", "datum0", "datum8"]
    );

    // inserting at the head drops the tail instead
    list.insert(0, Bytes::from("datumt")).unwrap();
    assert_eq!(
        contents(&list),
        vec!["datumt", "datum1", "datum2", "datums", "datum0"]
    );
}

#[test]
fn test_error_overflow_leaves_list_unchanged() {
    let mut list = list_with(3, OverflowAction::Error);
    fill(&mut list, &["a", "b", "c"]);

    for index in [2, 0, -1] {
        assert_eq!(list.insert(index, Bytes::from("x")), Err(CollectionError::Overflow));
    }
    assert_eq!(contents(&list), vec!["a", "b", "c"]);
}
