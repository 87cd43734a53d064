//! # Index Bounds Translation
//!
//! Turns a single bounds-generating predicate into the intervals an index
//! scan should visit over one key field, reporting how tight the result is.
//! Three entry points mirror how the access planner fills a compound scan:
//!
//! 1. `translate` - first predicate on a key field, fills the empty list
//! 2. `translate_and_intersect` - additional predicate under an AND
//! 3. `translate_and_union` - additional predicate under an OR
//!
//! Range predicates are type-bracketed: `{$gt: 21}` ends at the top of the
//! number class rather than `MaxKey`, so a scan over mixed-type keys never
//! drifts into a neighbouring class. Interval lists stay disjoint and
//! ascending through every operation; descending key fields are handled at
//! the end by `align_bounds`.

use crate::catalog::{IndexEntry, KeyComponent, KeyKind, KeyPattern};
use crate::matcher::{MatchExpression, MatchKind};
use crate::types::Value;
use eyre::{bail, ensure, Result};
use smallvec::{smallvec, SmallVec};
use std::cmp::Ordering;

use super::{all_values_list, BoundsTightness, Interval, IndexBounds, OrderedIntervalList};

type Intervals = SmallVec<[Interval; 2]>;

/// Translates `expr` into bounds over `key`, replacing whatever `list`
/// held. Returns the tightness of the produced bounds.
pub fn translate(
    expr: &MatchExpression,
    key: &KeyComponent,
    _index: &IndexEntry,
    list: &mut OrderedIntervalList,
) -> Result<BoundsTightness> {
    let (intervals, tightness) = translate_predicate(expr)?;
    list.name = key.name().to_string();
    list.intervals = intervals;
    Ok(tightness)
}

/// Translates `expr` and intersects the result with the intervals already
/// in `list`. Sound only on non-multikey indexes; the caller enforces that.
pub fn translate_and_intersect(
    expr: &MatchExpression,
    key: &KeyComponent,
    _index: &IndexEntry,
    list: &mut OrderedIntervalList,
) -> Result<BoundsTightness> {
    let (intervals, tightness) = translate_predicate(expr)?;
    list.name = key.name().to_string();
    list.intervals = intersect_lists(&list.intervals, &intervals);
    Ok(tightness)
}

/// Translates `expr` and unions the result with the intervals already in
/// `list`, coalescing overlaps.
pub fn translate_and_union(
    expr: &MatchExpression,
    key: &KeyComponent,
    _index: &IndexEntry,
    list: &mut OrderedIntervalList,
) -> Result<BoundsTightness> {
    let (intervals, tightness) = translate_predicate(expr)?;
    list.name = key.name().to_string();
    list.intervals = union_lists(&list.intervals, &intervals);
    Ok(tightness)
}

/// Fills `list` with the all-values interval for `key`.
pub fn all_values_for_field(key: &KeyComponent, list: &mut OrderedIntervalList) {
    *list = all_values_list(key.name());
}

/// Fills `bounds` with all-values intervals for every field of the key
/// pattern.
pub fn all_values_bounds(key_pattern: &KeyPattern, bounds: &mut IndexBounds) {
    bounds.fields = key_pattern
        .iter()
        .map(|component| all_values_list(component.name()))
        .collect();
    bounds.simple_range = None;
}

/// Reverses the interval lists of descending key fields. Bounds are built
/// assuming an ascending traversal per field; this aligns them with the
/// index's actual per-field directions.
pub fn align_bounds(bounds: &mut IndexBounds, key_pattern: &KeyPattern) {
    for (i, field) in bounds.fields.iter_mut().enumerate() {
        if key_pattern.component(i).map(|c| c.kind()) == Some(KeyKind::Descending) {
            field.reverse();
        }
    }
}

fn translate_predicate(expr: &MatchExpression) -> Result<(Intervals, BoundsTightness)> {
    match expr.kind() {
        MatchKind::Eq(value) => translate_equality(value),
        MatchKind::Lt(value) | MatchKind::Lte(value) | MatchKind::Gt(value)
        | MatchKind::Gte(value) => translate_range(expr.kind(), value),
        MatchKind::In(values) => translate_in(values),
        MatchKind::Regex { pattern } => Ok(translate_regex(pattern)),
        MatchKind::Exists(true) => Ok((
            smallvec![Interval::all_values()],
            BoundsTightness::InexactFetch,
        )),
        MatchKind::Exists(false) => Ok((
            smallvec![Interval::point(Value::Null)],
            BoundsTightness::InexactFetch,
        )),
        MatchKind::TypeOf(class) => {
            let start = Value::class_minimum(*class);
            let (end, end_inclusive) = Value::class_maximum(*class);
            let interval = Interval::new(start, true, end, end_inclusive);
            let mut intervals = Intervals::new();
            if interval.is_valid() {
                intervals.push(interval);
            }
            Ok((intervals, BoundsTightness::InexactFetch))
        }
        MatchKind::Not => {
            let child = match expr.child(0) {
                Some(child) => child,
                None => bail!("negation without a child predicate"),
            };
            let (intervals, child_tightness) = translate_predicate(child)?;
            let tightness = if child_tightness == BoundsTightness::Exact {
                BoundsTightness::Exact
            } else {
                BoundsTightness::InexactFetch
            };
            Ok((complement(&intervals), tightness))
        }
        MatchKind::ElemMatchValue => {
            ensure!(
                expr.num_children() > 0,
                "elemMatchValue without child predicates"
            );
            let mut combined: Option<Intervals> = None;
            for child in expr.children() {
                let (intervals, _) = translate_predicate(child)?;
                combined = Some(match combined {
                    None => intervals,
                    Some(existing) => intersect_lists(&existing, &intervals),
                });
            }
            Ok((
                combined.unwrap_or_default(),
                BoundsTightness::InexactFetch,
            ))
        }
        other => bail!("no interval bounds for {} predicate", other.name()),
    }
}

fn translate_equality(value: &Value) -> Result<(Intervals, BoundsTightness)> {
    ensure!(
        !matches!(value, Value::Array(_)),
        "array equality must be rewritten before bounds translation"
    );
    if value.is_null() {
        // Null also matches a missing field, which the key cannot show.
        return Ok((
            smallvec![Interval::point(Value::Null)],
            BoundsTightness::InexactFetch,
        ));
    }
    Ok((
        smallvec![Interval::point(value.clone())],
        BoundsTightness::Exact,
    ))
}

fn translate_range(kind: &MatchKind, value: &Value) -> Result<(Intervals, BoundsTightness)> {
    if value.is_null() {
        return Ok((
            smallvec![Interval::all_values()],
            BoundsTightness::InexactFetch,
        ));
    }
    let class = value.type_class();
    let interval = match kind {
        MatchKind::Lt(_) => Interval::new(Value::class_minimum(class), true, value.clone(), false),
        MatchKind::Lte(_) => Interval::new(Value::class_minimum(class), true, value.clone(), true),
        MatchKind::Gt(_) => {
            let (end, end_inclusive) = Value::class_maximum(class);
            Interval::new(value.clone(), false, end, end_inclusive)
        }
        MatchKind::Gte(_) => {
            let (end, end_inclusive) = Value::class_maximum(class);
            Interval::new(value.clone(), true, end, end_inclusive)
        }
        _ => bail!("not a range predicate"),
    };
    let mut intervals = Intervals::new();
    if interval.is_valid() {
        intervals.push(interval);
    }
    Ok((intervals, BoundsTightness::Exact))
}

fn translate_in(values: &[Value]) -> Result<(Intervals, BoundsTightness)> {
    let mut tightness = BoundsTightness::Exact;
    let mut points: Vec<Value> = Vec::with_capacity(values.len());
    for value in values {
        ensure!(
            !matches!(value, Value::Array(_)),
            "array member of $in must be rewritten before bounds translation"
        );
        if value.is_null() {
            tightness = BoundsTightness::InexactFetch;
        }
        points.push(value.clone());
    }
    points.sort();
    points.dedup();
    Ok((points.into_iter().map(Interval::point).collect(), tightness))
}

fn translate_regex(pattern: &str) -> (Intervals, BoundsTightness) {
    if let Some(prefix) = simple_prefix(pattern) {
        let (end, end_inclusive) = match prefix_successor(&prefix) {
            Some(successor) => (Value::Text(successor), false),
            None => Value::class_maximum(crate::types::TypeClass::Text),
        };
        let interval = Interval::new(Value::Text(prefix), true, end, end_inclusive);
        return (smallvec![interval], BoundsTightness::InexactCovered);
    }
    // Unanchored pattern: scan every string, recheck against the key.
    let (end, end_inclusive) = Value::class_maximum(crate::types::TypeClass::Text);
    let all_strings = Interval::new(Value::Text(String::new()), true, end, end_inclusive);
    (smallvec![all_strings], BoundsTightness::InexactCovered)
}

/// The literal prefix of an anchored pattern, if the whole pattern is
/// `^` followed by plain characters.
fn simple_prefix(pattern: &str) -> Option<String> {
    let body = pattern.strip_prefix('^')?;
    if body.is_empty() {
        return None;
    }
    let has_meta = body
        .chars()
        .any(|c| matches!(c, '.' | '^' | '$' | '*' | '+' | '?' | '(' | ')' | '[' | ']' | '{' | '}' | '\\' | '|'));
    if has_meta {
        None
    } else {
        Some(body.to_string())
    }
}

/// The least string strictly greater than every string with this prefix.
/// `None` when no such string exists below the top of the string class.
fn prefix_successor(prefix: &str) -> Option<String> {
    let mut chars: Vec<char> = prefix.chars().collect();
    while let Some(last) = chars.pop() {
        let mut next = last as u32 + 1;
        if next == 0xD800 {
            // Skip the surrogate gap.
            next = 0xE000;
        }
        if let Some(c) = char::from_u32(next) {
            chars.push(c);
            return Some(chars.into_iter().collect());
        }
    }
    None
}

fn cmp_start(a: (&Value, bool), b: (&Value, bool)) -> Ordering {
    // Inclusive start sorts before exclusive at the same value.
    a.0.cmp(b.0).then_with(|| b.1.cmp(&a.1))
}

fn cmp_end(a: (&Value, bool), b: (&Value, bool)) -> Ordering {
    // Exclusive end sorts before inclusive at the same value.
    a.0.cmp(b.0).then_with(|| a.1.cmp(&b.1))
}

/// Intersection of two disjoint ascending interval lists.
pub fn intersect_lists(a: &[Interval], b: &[Interval]) -> Intervals {
    let mut out = Intervals::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        let (x, y) = (&a[i], &b[j]);
        let (start, start_inclusive) = if cmp_start(
            (&x.start, x.start_inclusive),
            (&y.start, y.start_inclusive),
        ) == Ordering::Less
        {
            (y.start.clone(), y.start_inclusive)
        } else {
            (x.start.clone(), x.start_inclusive)
        };
        let x_ends_later = cmp_end((&x.end, x.end_inclusive), (&y.end, y.end_inclusive))
            == Ordering::Greater;
        let (end, end_inclusive) = if x_ends_later {
            (y.end.clone(), y.end_inclusive)
        } else {
            (x.end.clone(), x.end_inclusive)
        };
        let overlap = Interval::new(start, start_inclusive, end, end_inclusive);
        if overlap.is_valid() {
            out.push(overlap);
        }
        if x_ends_later {
            j += 1;
        } else {
            i += 1;
        }
    }
    out
}

/// Union of two disjoint ascending interval lists, coalescing intervals
/// that overlap or touch.
pub fn union_lists(a: &[Interval], b: &[Interval]) -> Intervals {
    let mut all: Vec<Interval> = a.iter().chain(b.iter()).cloned().collect();
    all.sort_by(|x, y| cmp_start((&x.start, x.start_inclusive), (&y.start, y.start_inclusive)));
    let mut out = Intervals::new();
    for interval in all {
        match out.last_mut() {
            Some(last) if connects(last, &interval) => {
                if cmp_end(
                    (&interval.end, interval.end_inclusive),
                    (&last.end, last.end_inclusive),
                ) == Ordering::Greater
                {
                    last.end = interval.end;
                    last.end_inclusive = interval.end_inclusive;
                }
            }
            _ => out.push(interval),
        }
    }
    out
}

/// True if `next` overlaps or touches the end of `current`.
fn connects(current: &Interval, next: &Interval) -> bool {
    match next.start.cmp(&current.end) {
        Ordering::Less => true,
        Ordering::Equal => next.start_inclusive || current.end_inclusive,
        Ordering::Greater => false,
    }
}

/// Complement of a disjoint ascending interval list over the whole key
/// space `[MinKey, MaxKey]`.
fn complement(intervals: &[Interval]) -> Intervals {
    let mut out = Intervals::new();
    let mut cursor = Value::MinKey;
    let mut cursor_inclusive = true;
    for interval in intervals {
        let gap = Interval::new(
            cursor,
            cursor_inclusive,
            interval.start.clone(),
            !interval.start_inclusive,
        );
        if gap.is_valid() {
            out.push(gap);
        }
        cursor = interval.end.clone();
        cursor_inclusive = !interval.end_inclusive;
    }
    let tail = Interval::new(cursor, cursor_inclusive, Value::MaxKey, true);
    if tail.is_valid() {
        out.push(tail);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::KeyComponent;
    use crate::types::TypeClass;

    fn sample_index() -> IndexEntry {
        IndexEntry::new("a_1", KeyPattern::new(vec![KeyComponent::asc("a")]))
    }

    fn translate_one(expr: &MatchExpression) -> (OrderedIntervalList, BoundsTightness) {
        let index = sample_index();
        let key = KeyComponent::asc("a");
        let mut list = OrderedIntervalList::default();
        let tightness = translate(expr, &key, &index, &mut list).unwrap();
        (list, tightness)
    }

    #[test]
    fn equality_is_a_point_and_exact() {
        let (list, tightness) = translate_one(&MatchExpression::eq("a", 5i64));
        assert_eq!(list.name, "a");
        assert_eq!(list.intervals.len(), 1);
        assert!(list.intervals[0].is_point());
        assert_eq!(tightness, BoundsTightness::Exact);
    }

    #[test]
    fn null_equality_needs_a_fetch() {
        let (_, tightness) = translate_one(&MatchExpression::eq("a", Value::Null));
        assert_eq!(tightness, BoundsTightness::InexactFetch);
    }

    #[test]
    fn ranges_are_type_bracketed() {
        let (list, tightness) = translate_one(&MatchExpression::gt("a", 7i64));
        assert_eq!(tightness, BoundsTightness::Exact);
        let interval = &list.intervals[0];
        assert_eq!(interval.start, Value::Int(7));
        assert!(!interval.start_inclusive);
        assert_eq!(interval.end, Value::Double(f64::INFINITY));
        assert!(interval.end_inclusive);

        let (list, _) = translate_one(&MatchExpression::lt("a", Value::text("m")));
        let interval = &list.intervals[0];
        assert_eq!(interval.start, Value::Text(String::new()));
        assert_eq!(interval.end, Value::text("m"));
    }

    #[test]
    fn in_set_is_sorted_deduped_points() {
        let (list, tightness) = translate_one(&MatchExpression::in_set(
            "a",
            vec![Value::Int(9), Value::Int(2), Value::Int(9)],
        ));
        assert_eq!(tightness, BoundsTightness::Exact);
        assert_eq!(list.intervals.len(), 2);
        assert_eq!(list.intervals[0].start, Value::Int(2));
        assert_eq!(list.intervals[1].start, Value::Int(9));
    }

    #[test]
    fn prefix_regex_scans_a_string_range() {
        let (list, tightness) = translate_one(&MatchExpression::regex("a", "^foo"));
        assert_eq!(tightness, BoundsTightness::InexactCovered);
        let interval = &list.intervals[0];
        assert_eq!(interval.start, Value::text("foo"));
        assert!(interval.start_inclusive);
        assert_eq!(interval.end, Value::text("fop"));
        assert!(!interval.end_inclusive);
    }

    #[test]
    fn unanchored_regex_scans_all_strings() {
        let (list, tightness) = translate_one(&MatchExpression::regex("a", "bar"));
        assert_eq!(tightness, BoundsTightness::InexactCovered);
        let interval = &list.intervals[0];
        assert_eq!(interval.start, Value::Text(String::new()));
        assert_eq!(interval.end, Value::Object(Vec::new()));
        assert!(!interval.end_inclusive);
    }

    #[test]
    fn negation_complements_the_child() {
        let (list, tightness) =
            translate_one(&MatchExpression::not(MatchExpression::eq("a", 5i64)));
        assert_eq!(tightness, BoundsTightness::Exact);
        assert_eq!(list.intervals.len(), 2);
        assert_eq!(list.intervals[0].start, Value::MinKey);
        assert_eq!(list.intervals[0].end, Value::Int(5));
        assert!(!list.intervals[0].end_inclusive);
        assert_eq!(list.intervals[1].start, Value::Int(5));
        assert!(!list.intervals[1].start_inclusive);
        assert_eq!(list.intervals[1].end, Value::MaxKey);
    }

    #[test]
    fn type_predicate_spans_its_class() {
        let (list, tightness) =
            translate_one(&MatchExpression::type_of("a", TypeClass::Text));
        assert_eq!(tightness, BoundsTightness::InexactFetch);
        assert_eq!(list.intervals[0].start, Value::Text(String::new()));
        assert_eq!(list.intervals[0].end, Value::Object(Vec::new()));
    }

    #[test]
    fn intersection_narrows_a_compound_of_ranges() {
        let index = sample_index();
        let key = KeyComponent::asc("a");
        let mut list = OrderedIntervalList::default();
        translate(&MatchExpression::gte("a", 2i64), &key, &index, &mut list).unwrap();
        translate_and_intersect(&MatchExpression::lt("a", 9i64), &key, &index, &mut list)
            .unwrap();
        assert_eq!(list.intervals.len(), 1);
        let interval = &list.intervals[0];
        assert_eq!(interval.start, Value::Int(2));
        assert!(interval.start_inclusive);
        assert_eq!(interval.end, Value::Int(9));
        assert!(!interval.end_inclusive);
    }

    #[test]
    fn union_coalesces_touching_intervals() {
        let index = sample_index();
        let key = KeyComponent::asc("a");
        let mut list = OrderedIntervalList::default();
        translate(&MatchExpression::lte("a", 5i64), &key, &index, &mut list).unwrap();
        translate_and_union(&MatchExpression::gte("a", 5i64), &key, &index, &mut list)
            .unwrap();
        assert_eq!(list.intervals.len(), 1, "[-inf,5] and [5,inf] should merge");

        let mut disjoint = OrderedIntervalList::default();
        translate(&MatchExpression::eq("a", 1i64), &key, &index, &mut disjoint).unwrap();
        translate_and_union(&MatchExpression::eq("a", 7i64), &key, &index, &mut disjoint)
            .unwrap();
        assert_eq!(disjoint.intervals.len(), 2);
    }

    #[test]
    fn elem_match_value_intersects_its_children() {
        let expr = MatchExpression::elem_match_value(
            "a",
            vec![
                MatchExpression::gt("", 2i64),
                MatchExpression::lt("", 8i64),
            ],
        );
        let (list, tightness) = translate_one(&expr);
        assert_eq!(tightness, BoundsTightness::InexactFetch);
        assert_eq!(list.intervals.len(), 1);
        assert_eq!(list.intervals[0].start, Value::Int(2));
        assert_eq!(list.intervals[0].end, Value::Int(8));
    }

    #[test]
    fn prefix_successor_rolls_over_max_chars() {
        assert_eq!(prefix_successor("foo"), Some("fop".to_string()));
        assert_eq!(
            prefix_successor(&format!("a{}", char::MAX)),
            Some("b".to_string())
        );
        assert_eq!(prefix_successor(&char::MAX.to_string()), None);
    }
}
