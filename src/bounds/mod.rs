//! # Index Bounds
//!
//! The key-space regions an index scan visits. Bounds for a compound index
//! are one [`OrderedIntervalList`] per key field; each list holds disjoint
//! [`Interval`]s in ascending order. A list whose `name` is empty has not
//! been filled in yet - leaf finishing replaces every unfilled trailing
//! field with the all-values interval before a scan is emitted.
//!
//! Whole-range shortcut scans skip the per-field representation and carry a
//! [`SimpleRange`] of raw start/end keys instead.
//!
//! ## Tightness
//!
//! Every translation reports how faithfully the produced intervals capture
//! the predicate via [`BoundsTightness`]: `Exact` bounds answer it
//! completely, `InexactCovered` bounds need a recheck against the index
//! key, `InexactFetch` bounds need the full document.

pub mod builder;

use crate::types::Value;
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// How faithfully a set of index bounds captures its predicate. Ordered
/// from strongest to weakest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BoundsTightness {
    /// The scan returns exactly the matching keys; the predicate can be
    /// discarded.
    Exact,
    /// The index key carries enough to recheck the predicate without
    /// fetching the document.
    InexactCovered,
    /// The document must be fetched and re-filtered.
    InexactFetch,
}

/// A contiguous range of values with per-endpoint inclusivity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: Value,
    pub end: Value,
    pub start_inclusive: bool,
    pub end_inclusive: bool,
}

impl Interval {
    pub fn new(start: Value, start_inclusive: bool, end: Value, end_inclusive: bool) -> Self {
        Self {
            start,
            end,
            start_inclusive,
            end_inclusive,
        }
    }

    /// The degenerate interval `[value, value]`.
    pub fn point(value: Value) -> Self {
        Self::new(value.clone(), true, value, true)
    }

    /// The interval spanning the whole key space, `[MinKey, MaxKey]`.
    pub fn all_values() -> Self {
        Self::new(Value::MinKey, true, Value::MaxKey, true)
    }

    pub fn is_point(&self) -> bool {
        self.start_inclusive && self.end_inclusive && self.start == self.end
    }

    /// True if the interval contains at least one value.
    pub fn is_valid(&self) -> bool {
        self.start < self.end
            || (self.start == self.end && self.start_inclusive && self.end_inclusive)
    }

    /// Flips the interval for a descending traversal.
    pub fn reverse(&mut self) {
        std::mem::swap(&mut self.start, &mut self.end);
        std::mem::swap(&mut self.start_inclusive, &mut self.end_inclusive);
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}, {}{}",
            if self.start_inclusive { '[' } else { '(' },
            self.start,
            self.end,
            if self.end_inclusive { ']' } else { ')' },
        )
    }
}

/// Disjoint, ascending intervals over one key field. `name` is the key
/// field's name; an empty name marks a list that has not been filled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OrderedIntervalList {
    pub name: String,
    pub intervals: SmallVec<[Interval; 2]>,
}

impl OrderedIntervalList {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            intervals: SmallVec::new(),
        }
    }

    pub fn is_unfilled(&self) -> bool {
        self.name.is_empty()
    }

    /// True if every interval is a single point.
    pub fn is_all_points(&self) -> bool {
        self.intervals.iter().all(Interval::is_point)
    }

    /// Flips interval order and endpoints for a descending key field.
    pub fn reverse(&mut self) {
        self.intervals.reverse();
        for interval in &mut self.intervals {
            interval.reverse();
        }
    }
}

impl fmt::Display for OrderedIntervalList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", if self.name.is_empty() { "?" } else { self.name.as_str() })?;
        for (i, interval) in self.intervals.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", interval)?;
        }
        Ok(())
    }
}

/// A raw `[start_key, end_key)`-style range used by whole-range shortcut
/// scans instead of per-field interval lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleRange {
    pub start_key: Value,
    pub end_key: Value,
    pub end_key_inclusive: bool,
}

/// Bounds for every key field of one index scan.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexBounds {
    pub fields: Vec<OrderedIntervalList>,
    pub simple_range: Option<SimpleRange>,
}

impl IndexBounds {
    /// Bounds with `count` unfilled per-field lists, one per key field.
    pub fn with_field_count(count: usize) -> Self {
        Self {
            fields: vec![OrderedIntervalList::default(); count],
            simple_range: None,
        }
    }
}

impl fmt::Display for IndexBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(range) = &self.simple_range {
            return write!(
                f,
                "[{}, {}{}",
                range.start_key,
                range.end_key,
                if range.end_key_inclusive { ']' } else { ')' },
            );
        }
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", field)?;
        }
        Ok(())
    }
}

/// The all-values list for a named key field.
pub fn all_values_list(name: impl Into<String>) -> OrderedIntervalList {
    OrderedIntervalList {
        name: name.into(),
        intervals: smallvec![Interval::all_values()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightness_orders_strongest_first() {
        assert!(BoundsTightness::Exact < BoundsTightness::InexactCovered);
        assert!(BoundsTightness::InexactCovered < BoundsTightness::InexactFetch);
    }

    #[test]
    fn interval_validity() {
        assert!(Interval::point(Value::Int(5)).is_valid());
        assert!(Interval::all_values().is_valid());

        let empty = Interval::new(Value::Int(5), false, Value::Int(5), true);
        assert!(!empty.is_valid(), "half-open point interval is empty");

        let backwards = Interval::new(Value::Int(9), true, Value::Int(2), true);
        assert!(!backwards.is_valid());
    }

    #[test]
    fn reversing_flips_order_and_endpoints() {
        let mut list = OrderedIntervalList::new("a");
        list.intervals.push(Interval::new(Value::Int(1), true, Value::Int(2), false));
        list.intervals.push(Interval::new(Value::Int(5), true, Value::Int(9), true));
        list.reverse();
        assert_eq!(list.intervals[0].start, Value::Int(9));
        assert_eq!(list.intervals[0].end, Value::Int(5));
        assert_eq!(list.intervals[1].start, Value::Int(2));
        assert!(!list.intervals[1].start_inclusive);
    }
}
