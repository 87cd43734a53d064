//! # Query Planner
//!
//! The access-path planning layer: turns a tagged predicate tree into an
//! executable plan tree. `query` carries the read-only query context,
//! `node` defines the plan operators and their derived properties, and
//! `access` holds the planner itself.

pub mod access;
pub mod node;
pub mod query;

pub use access::AccessPlanner;
pub use node::{
    AndHashNode, AndSortedNode, CollectionScanNode, FetchNode, Geo2dNode, GeoNear2dSphereNode,
    IndexScanNode, MergeSortNode, OrNode, PlanNode, ScanDirection, TextNode,
};
pub use query::{CanonicalQuery, ParsedQuery, Projection, SortField, SortOrder, SortPattern};
