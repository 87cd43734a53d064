//! # Bounds Builder Integration Tests
//!
//! Exercises the bounds-translation surface the way the access planner
//! consumes it: fill a compound index's bounds field by field, combine
//! predicates on a shared field, then finalize with all-values filler and
//! direction alignment.

use quilldb_query::bounds::{builder, BoundsTightness, IndexBounds, Interval, OrderedIntervalList};
use quilldb_query::catalog::{IndexEntry, KeyComponent, KeyPattern};
use quilldb_query::matcher::MatchExpression;
use quilldb_query::types::Value;

fn descending_index() -> IndexEntry {
    IndexEntry::new(
        "a_1_b_-1",
        KeyPattern::new(vec![KeyComponent::asc("a"), KeyComponent::desc("b")]),
    )
}

#[test]
fn compound_bounds_fill_field_by_field() {
    let index = descending_index();
    let mut bounds = IndexBounds::with_field_count(2);
    assert!(bounds.fields[0].is_unfilled());

    let tightness = builder::translate(
        &MatchExpression::eq("a", 3i64),
        index.key_pattern().component(0).unwrap(),
        &index,
        &mut bounds.fields[0],
    )
    .unwrap();
    assert_eq!(tightness, BoundsTightness::Exact);
    assert!(!bounds.fields[0].is_unfilled());
    assert!(bounds.fields[1].is_unfilled());
}

#[test]
fn alignment_reverses_only_descending_fields() {
    let index = descending_index();
    let mut bounds = IndexBounds::with_field_count(2);
    builder::translate(
        &MatchExpression::gte("a", 1i64),
        index.key_pattern().component(0).unwrap(),
        &index,
        &mut bounds.fields[0],
    )
    .unwrap();
    builder::translate(
        &MatchExpression::gte("b", 4i64),
        index.key_pattern().component(1).unwrap(),
        &index,
        &mut bounds.fields[1],
    )
    .unwrap();

    builder::align_bounds(&mut bounds, index.key_pattern());

    assert_eq!(
        bounds.fields[0].intervals[0].start,
        Value::Int(1),
        "ascending field keeps its order"
    );
    assert_eq!(
        bounds.fields[1].intervals[0].start,
        Value::Double(f64::INFINITY),
        "descending field runs high to low"
    );
    assert_eq!(bounds.fields[1].intervals[0].end, Value::Int(4));
}

#[test]
fn all_values_bounds_cover_every_key_field() {
    let index = descending_index();
    let mut bounds = IndexBounds::default();
    builder::all_values_bounds(index.key_pattern(), &mut bounds);
    assert_eq!(bounds.fields.len(), 2);
    for (field, component) in bounds.fields.iter().zip(index.key_pattern().iter()) {
        assert_eq!(field.name, component.name());
        assert_eq!(field.intervals.as_slice(), &[Interval::all_values()]);
    }
}

#[test]
fn union_then_intersection_keeps_lists_disjoint_and_sorted() {
    let index = descending_index();
    let key = KeyComponent::asc("a");
    let mut list = OrderedIntervalList::default();

    builder::translate(&MatchExpression::lt("a", 4i64), &key, &index, &mut list).unwrap();
    builder::translate_and_union(&MatchExpression::gt("a", 10i64), &key, &index, &mut list)
        .unwrap();
    assert_eq!(list.intervals.len(), 2);

    builder::translate_and_intersect(&MatchExpression::gte("a", 2i64), &key, &index, &mut list)
        .unwrap();
    assert_eq!(list.intervals.len(), 2);
    assert_eq!(list.intervals[0].start, Value::Int(2));
    assert_eq!(list.intervals[0].end, Value::Int(4));
    assert_eq!(list.intervals[1].start, Value::Int(10));
    for pair in list.intervals.windows(2) {
        assert!(
            pair[0].end <= pair[1].start,
            "intervals must stay disjoint and ascending"
        );
    }
}

#[test]
fn in_list_unions_with_range_bounds() {
    let index = descending_index();
    let key = KeyComponent::asc("a");
    let mut list = OrderedIntervalList::default();

    builder::translate(
        &MatchExpression::in_set("a", vec![Value::Int(1), Value::Int(5)]),
        &key,
        &index,
        &mut list,
    )
    .unwrap();
    builder::translate_and_union(
        &MatchExpression::gte("a", 4i64),
        &key,
        &index,
        &mut list,
    )
    .unwrap();

    assert_eq!(list.intervals.len(), 2, "the 5-point folds into the range");
    assert!(list.intervals[0].is_point());
    assert_eq!(list.intervals[1].start, Value::Int(4));
}
