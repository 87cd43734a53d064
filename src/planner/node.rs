//! # Plan Tree
//!
//! The executable access plan produced by the planner: a tree of scan,
//! fetch, intersection, union and merge operators. Each variant owns its
//! children outright; there are no parent links, so subtrees move freely
//! during assembly.
//!
//! ## Operator Variants
//!
//! - **Scan leaves**: `CollectionScan`, `IndexScan`, `Geo2d`,
//!   `GeoNear2dSphere`, `TextMatch`
//! - **Recheck**: `Fetch` - loads the document and re-applies a residual
//!   filter
//! - **Combinators**: `AndHash`, `AndSorted`, `Or`, `MergeSort`
//!
//! The derived properties at the bottom (`provided_sorts`,
//! `sorted_by_record_id`) drive the planner's choice between sorted and
//! hashed intersection and between merge-sort and plain union.

use crate::bounds::IndexBounds;
use crate::catalog::{KeyKind, KeyPattern};
use crate::matcher::{GeoQuery, MatchExpression, NearQuery, TextQuery};
use crate::types::Value;
use std::collections::BTreeSet;
use std::fmt;

use super::query::{SortField, SortPattern};

/// Traversal direction of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanDirection {
    #[default]
    Forward,
    Backward,
}

impl ScanDirection {
    pub fn reversed(&self) -> ScanDirection {
        match self {
            ScanDirection::Forward => ScanDirection::Backward,
            ScanDirection::Backward => ScanDirection::Forward,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionScanNode {
    pub ns: String,
    pub filter: Option<MatchExpression>,
    pub direction: ScanDirection,
    pub max_scan: Option<u64>,
    pub tailable: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexScanNode {
    pub key_pattern: KeyPattern,
    pub multikey: bool,
    pub bounds: IndexBounds,
    pub direction: ScanDirection,
    pub filter: Option<MatchExpression>,
    pub max_scan: Option<u64>,
    pub add_key_metadata: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoNear2dSphereNode {
    pub key_pattern: KeyPattern,
    pub near: NearQuery,
    pub base_bounds: IndexBounds,
    pub filter: Option<MatchExpression>,
    pub add_point_meta: bool,
    pub add_distance_meta: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Geo2dNode {
    pub key_pattern: KeyPattern,
    pub geo: GeoQuery,
    pub filter: Option<MatchExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub key_pattern: KeyPattern,
    pub search: TextQuery,
    /// Point values for the prefix key fields, assembled from equality
    /// predicates when the leaf is finished.
    pub index_prefix: Option<Value>,
    pub filter: Option<MatchExpression>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchNode {
    pub filter: Option<MatchExpression>,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndHashNode {
    pub children: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AndSortedNode {
    pub children: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrNode {
    pub children: Vec<PlanNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeSortNode {
    pub sort: SortPattern,
    pub children: Vec<PlanNode>,
}

/// One operator of an access plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanNode {
    CollectionScan(CollectionScanNode),
    IndexScan(IndexScanNode),
    GeoNear2dSphere(GeoNear2dSphereNode),
    Geo2d(Geo2dNode),
    TextMatch(TextNode),
    Fetch(FetchNode),
    AndHash(AndHashNode),
    AndSorted(AndSortedNode),
    Or(OrNode),
    MergeSort(MergeSortNode),
}

impl PlanNode {
    pub fn children(&self) -> &[PlanNode] {
        match self {
            PlanNode::Fetch(n) => std::slice::from_ref(n.child.as_ref()),
            PlanNode::AndHash(n) => &n.children,
            PlanNode::AndSorted(n) => &n.children,
            PlanNode::Or(n) => &n.children,
            PlanNode::MergeSort(n) => &n.children,
            _ => &[],
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, PlanNode::TextMatch(_))
    }

    pub fn filter(&self) -> Option<&MatchExpression> {
        match self {
            PlanNode::CollectionScan(n) => n.filter.as_ref(),
            PlanNode::IndexScan(n) => n.filter.as_ref(),
            PlanNode::GeoNear2dSphere(n) => n.filter.as_ref(),
            PlanNode::Geo2d(n) => n.filter.as_ref(),
            PlanNode::TextMatch(n) => n.filter.as_ref(),
            PlanNode::Fetch(n) => n.filter.as_ref(),
            _ => None,
        }
    }

    /// Mutable access to the filter slot, for variants that carry one.
    pub fn filter_mut(&mut self) -> Option<&mut Option<MatchExpression>> {
        match self {
            PlanNode::CollectionScan(n) => Some(&mut n.filter),
            PlanNode::IndexScan(n) => Some(&mut n.filter),
            PlanNode::GeoNear2dSphere(n) => Some(&mut n.filter),
            PlanNode::Geo2d(n) => Some(&mut n.filter),
            PlanNode::TextMatch(n) => Some(&mut n.filter),
            PlanNode::Fetch(n) => Some(&mut n.filter),
            _ => None,
        }
    }

    /// True if the operator emits documents in record-identifier order,
    /// which is what sorted intersection requires of its inputs.
    pub fn sorted_by_record_id(&self) -> bool {
        match self {
            PlanNode::IndexScan(n) => {
                // Record ids break ties behind the key, so the output is in
                // record order only when the key is pinned to single points.
                if n.multikey {
                    return false;
                }
                if let Some(range) = &n.bounds.simple_range {
                    return range.start_key == range.end_key;
                }
                n.bounds
                    .fields
                    .iter()
                    .all(|field| field.intervals.len() == 1 && field.intervals[0].is_point())
            }
            PlanNode::Fetch(n) => n.child.sorted_by_record_id(),
            PlanNode::AndSorted(n) => n.children.iter().all(PlanNode::sorted_by_record_id),
            _ => false,
        }
    }

    /// The set of sort orders this operator's output satisfies.
    ///
    /// An index scan provides every non-empty prefix of its
    /// direction-adjusted key pattern; a fetch is order-preserving; a hash
    /// intersection streams its last child.
    pub fn provided_sorts(&self) -> BTreeSet<SortPattern> {
        match self {
            PlanNode::IndexScan(n) => {
                let mut fields = Vec::new();
                for component in n.key_pattern.iter() {
                    let field = match component.kind() {
                        KeyKind::Ascending => SortField::asc(component.name()),
                        KeyKind::Descending => SortField::desc(component.name()),
                        // Geo and text columns are not ordered by value.
                        _ => break,
                    };
                    fields.push(field);
                }
                let full = SortPattern::new(fields);
                let full = match n.direction {
                    ScanDirection::Forward => full,
                    ScanDirection::Backward => full.reversed(),
                };
                (1..=full.len()).map(|end| full.prefix(end)).collect()
            }
            PlanNode::Fetch(n) => n.child.provided_sorts(),
            PlanNode::AndHash(n) => n
                .children
                .last()
                .map(PlanNode::provided_sorts)
                .unwrap_or_default(),
            PlanNode::MergeSort(n) => {
                let mut sorts = BTreeSet::new();
                sorts.insert(n.sort.clone());
                sorts
            }
            _ => BTreeSet::new(),
        }
    }

    /// Flips every scan under this node to the opposite direction,
    /// reversing bounds so they stay aligned with the traversal.
    pub fn reverse_scans(&mut self) {
        match self {
            PlanNode::CollectionScan(n) => {
                n.direction = n.direction.reversed();
            }
            PlanNode::IndexScan(n) => {
                n.direction = n.direction.reversed();
                match &mut n.bounds.simple_range {
                    Some(range) => {
                        std::mem::swap(&mut range.start_key, &mut range.end_key);
                    }
                    None => {
                        for field in &mut n.bounds.fields {
                            field.reverse();
                        }
                    }
                }
            }
            PlanNode::MergeSort(n) => {
                n.sort = n.sort.reversed();
                for child in &mut n.children {
                    child.reverse_scans();
                }
            }
            PlanNode::Fetch(n) => n.child.reverse_scans(),
            PlanNode::AndHash(n) => {
                for child in &mut n.children {
                    child.reverse_scans();
                }
            }
            PlanNode::AndSorted(n) => {
                for child in &mut n.children {
                    child.reverse_scans();
                }
            }
            PlanNode::Or(n) => {
                for child in &mut n.children {
                    child.reverse_scans();
                }
            }
            PlanNode::GeoNear2dSphere(_) | PlanNode::Geo2d(_) | PlanNode::TextMatch(_) => {}
        }
    }
}

fn write_children(f: &mut fmt::Formatter<'_>, children: &[PlanNode]) -> fmt::Result {
    for (i, child) in children.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", child)?;
    }
    Ok(())
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanNode::CollectionScan(n) => {
                write!(f, "COLLSCAN({}", n.ns)?;
                if n.direction == ScanDirection::Backward {
                    write!(f, ", backward")?;
                }
                if let Some(filter) = &n.filter {
                    write!(f, ", filter: {}", filter)?;
                }
                write!(f, ")")
            }
            PlanNode::IndexScan(n) => {
                write!(f, "IXSCAN({}, {}", n.key_pattern, n.bounds)?;
                if n.direction == ScanDirection::Backward {
                    write!(f, ", backward")?;
                }
                if let Some(filter) = &n.filter {
                    write!(f, ", filter: {}", filter)?;
                }
                write!(f, ")")
            }
            PlanNode::GeoNear2dSphere(n) => {
                write!(f, "GEO_NEAR_2DSPHERE({}, {}", n.key_pattern, n.base_bounds)?;
                if let Some(filter) = &n.filter {
                    write!(f, ", filter: {}", filter)?;
                }
                write!(f, ")")
            }
            PlanNode::Geo2d(n) => write!(f, "GEO_2D({})", n.key_pattern),
            PlanNode::TextMatch(n) => {
                write!(f, "TEXT(\"{}\"", n.search.query)?;
                if let Some(prefix) = &n.index_prefix {
                    write!(f, ", prefix: {}", prefix)?;
                }
                if let Some(filter) = &n.filter {
                    write!(f, ", filter: {}", filter)?;
                }
                write!(f, ")")
            }
            PlanNode::Fetch(n) => {
                write!(f, "FETCH(")?;
                if let Some(filter) = &n.filter {
                    write!(f, "filter: {}, ", filter)?;
                }
                write!(f, "{})", n.child)
            }
            PlanNode::AndHash(n) => {
                write!(f, "AND_HASH(")?;
                write_children(f, &n.children)?;
                write!(f, ")")
            }
            PlanNode::AndSorted(n) => {
                write!(f, "AND_SORTED(")?;
                write_children(f, &n.children)?;
                write!(f, ")")
            }
            PlanNode::Or(n) => {
                write!(f, "OR(")?;
                write_children(f, &n.children)?;
                write!(f, ")")
            }
            PlanNode::MergeSort(n) => {
                write!(f, "MERGE_SORT({}, ", n.sort)?;
                write_children(f, &n.children)?;
                write!(f, ")")
            }
        }
    }
}
