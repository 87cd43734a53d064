//! # Predicate Matching Layer
//!
//! The canonicalized predicate tree ([`MatchExpression`]), the enumerator's
//! index assignments ([`IndexTag`]) and the indexability tests the access
//! planner dispatches on.
//!
//! Predicate trees arrive already canonicalized and tagged; this module
//! does no parsing or rewriting. Its job is to give the planner a tree it
//! can take apart: children detach in place, subtrees re-parent onto plan
//! filters, and whatever the index answers exactly is dropped.

mod expr;
pub mod indexability;
mod tag;

pub use expr::{GeoQuery, GeoRegion, MatchExpression, MatchKind, NearQuery, TextQuery};
pub use tag::IndexTag;
