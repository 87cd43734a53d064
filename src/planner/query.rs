//! # Canonical Query Context
//!
//! The read-only query state every access builder consults: namespace,
//! predicate root, requested sort, `$natural` directives, scan limits and
//! projection metadata. The predicate tree itself is handed to the planner
//! separately and consumed; the copy kept here only feeds the degenerate
//! builders, which clone it into collection-scan and whole-index filters.

use crate::matcher::MatchExpression;
use std::fmt;

use super::node::ScanDirection;

/// Direction of one field in a sort pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn reversed(&self) -> SortOrder {
        match self {
            SortOrder::Ascending => SortOrder::Descending,
            SortOrder::Descending => SortOrder::Ascending,
        }
    }
}

/// One field of a sort pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortField {
    name: String,
    order: SortOrder,
}

impl SortField {
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Ascending,
        }
    }

    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: SortOrder::Descending,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn order(&self) -> SortOrder {
        self.order
    }
}

/// An ordered sort specification such as `{a: 1, b: -1}`. Totally ordered
/// so sets of sort patterns have a canonical form for intersection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SortPattern {
    fields: Vec<SortField>,
}

impl SortPattern {
    pub fn new(fields: Vec<SortField>) -> Self {
        Self { fields }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[SortField] {
        &self.fields
    }

    /// The pattern over the first `count` fields.
    pub fn prefix(&self, count: usize) -> SortPattern {
        SortPattern {
            fields: self.fields.iter().take(count).cloned().collect(),
        }
    }

    pub fn reversed(&self) -> SortPattern {
        SortPattern {
            fields: self
                .fields
                .iter()
                .map(|f| SortField {
                    name: f.name.clone(),
                    order: f.order.reversed(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for SortPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            let order = match field.order {
                SortOrder::Ascending => 1,
                SortOrder::Descending => -1,
            };
            write!(f, "{}: {}", field.name, order)?;
        }
        write!(f, " }}")
    }
}

/// Parsed query options the planner consults.
#[derive(Debug, Clone, Default)]
pub struct ParsedQuery {
    sort: SortPattern,
    natural_sort: Option<ScanDirection>,
    natural_hint: Option<ScanDirection>,
    max_scan: Option<u64>,
    return_key: bool,
}

impl ParsedQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sort(mut self, sort: SortPattern) -> Self {
        self.sort = sort;
        self
    }

    /// A `{$natural: 1}`-style sort, which steers collection-scan direction
    /// instead of ordering results.
    pub fn with_natural_sort(mut self, direction: ScanDirection) -> Self {
        self.natural_sort = Some(direction);
        self
    }

    /// A `$natural` hint; wins over a `$natural` sort.
    pub fn with_natural_hint(mut self, direction: ScanDirection) -> Self {
        self.natural_hint = Some(direction);
        self
    }

    pub fn with_max_scan(mut self, max_scan: u64) -> Self {
        self.max_scan = Some(max_scan);
        self
    }

    pub fn with_return_key(mut self, return_key: bool) -> Self {
        self.return_key = return_key;
        self
    }

    pub fn sort(&self) -> &SortPattern {
        &self.sort
    }

    pub fn natural_sort(&self) -> Option<ScanDirection> {
        self.natural_sort
    }

    pub fn natural_hint(&self) -> Option<ScanDirection> {
        self.natural_hint
    }

    pub fn max_scan(&self) -> Option<u64> {
        self.max_scan
    }

    pub fn return_key(&self) -> bool {
        self.return_key
    }
}

/// Projection metadata the planner cares about: whether geo-near scans
/// must attach point and distance metadata for the projection stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projection {
    wants_near_point: bool,
    wants_near_distance: bool,
}

impl Projection {
    pub fn new(wants_near_point: bool, wants_near_distance: bool) -> Self {
        Self {
            wants_near_point,
            wants_near_distance,
        }
    }

    pub fn wants_near_point(&self) -> bool {
        self.wants_near_point
    }

    pub fn wants_near_distance(&self) -> bool {
        self.wants_near_distance
    }
}

/// A parsed, canonicalized query.
#[derive(Debug, Clone)]
pub struct CanonicalQuery {
    ns: String,
    root: MatchExpression,
    parsed: ParsedQuery,
    projection: Option<Projection>,
}

impl CanonicalQuery {
    pub fn new(ns: impl Into<String>, root: MatchExpression) -> Self {
        Self {
            ns: ns.into(),
            root,
            parsed: ParsedQuery::default(),
            projection: None,
        }
    }

    pub fn with_parsed(mut self, parsed: ParsedQuery) -> Self {
        self.parsed = parsed;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn ns(&self) -> &str {
        &self.ns
    }

    pub fn root(&self) -> &MatchExpression {
        &self.root
    }

    pub fn parsed(&self) -> &ParsedQuery {
        &self.parsed
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }
}
