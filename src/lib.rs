//! # QuillDB Query Planning
//!
//! The query-planning layer of QuillDB, an embedded document database.
//! This crate's core is the access-path planner: given a canonicalized
//! predicate tree whose nodes a plan enumerator has tagged with index
//! assignments, it produces an executable access plan - a tree of scan,
//! fetch, intersect, union and merge-sort operators that retrieves the
//! candidate document set.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │   Plan enumerator (tags predicates)      │   upstream
//! ├─────────────────────────────────────────┤
//! │   planner::access  (this crate's core)   │
//! │     dispatch → scan assembly → leaves    │
//! ├──────────────┬──────────────────────────┤
//! │ bounds       │ matcher / catalog / types │
//! │ translation  │ predicate tree, indexes   │
//! ├──────────────┴──────────────────────────┤
//! │   Execution engine (consumes PlanNode)    │  downstream
//! └─────────────────────────────────────────┘
//! ```
//!
//! Planning is a pure, single-threaded tree-to-tree transformation: no
//! I/O, no shared state, and deterministic output for identical inputs.
//! The input predicate tree is consumed; predicates answered exactly by
//! index bounds are dropped, covered predicates become scan filters, and
//! residuals end up above a fetch.
//!
//! ## Example
//!
//! ```
//! use quilldb_query::catalog::{IndexEntry, KeyComponent, KeyPattern};
//! use quilldb_query::matcher::MatchExpression;
//! use quilldb_query::planner::{AccessPlanner, CanonicalQuery, PlanNode};
//!
//! let indices = vec![IndexEntry::new(
//!     "age_1",
//!     KeyPattern::new(vec![KeyComponent::asc("age")]),
//! )];
//! let root = MatchExpression::eq("age", 30i64).with_tag(0, 0);
//! let query = CanonicalQuery::new("app.users", root.clone());
//!
//! let planner = AccessPlanner::new(&query, &indices);
//! let plan = planner.build_indexed_data_access(root).unwrap().unwrap();
//! assert!(matches!(plan, PlanNode::IndexScan(_)));
//! ```
//!
//! ## Module Overview
//!
//! - [`types`]: document values with a total order
//! - [`matcher`]: the predicate tree, index tags and indexability tests
//! - [`catalog`]: index descriptors (key patterns, multikey, index family)
//! - [`bounds`]: index-bounds model and predicate-to-interval translation
//! - [`planner`]: plan operators and the access-path planner

pub mod bounds;
pub mod catalog;
pub mod matcher;
pub mod planner;
pub mod types;

pub use planner::{AccessPlanner, CanonicalQuery, PlanNode};
