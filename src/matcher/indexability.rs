//! # Indexability Tests
//!
//! Predicates over [`MatchExpression`] nodes answering one question: can
//! this node produce index bounds, and if so over whose field? The access
//! planner's dispatch is driven entirely by these four tests.

use super::expr::{MatchExpression, MatchKind};

/// True if `expr` can use an index over its own path: bounds-producing
/// leaves and `ElemMatchValue` (whose children all constrain the
/// elem-match's path). Logical nodes and the other array operators are
/// indexed, if at all, by virtue of their children.
pub fn node_can_use_index_on_own_field(expr: &MatchExpression) -> bool {
    if expr.is_logical() {
        return false;
    }
    if expr.is_array_operator() {
        return matches!(expr.kind(), MatchKind::ElemMatchValue);
    }
    matches!(
        expr.kind(),
        MatchKind::Eq(_)
            | MatchKind::Lt(_)
            | MatchKind::Lte(_)
            | MatchKind::Gt(_)
            | MatchKind::Gte(_)
            | MatchKind::In(_)
            | MatchKind::Regex { .. }
            | MatchKind::Exists(_)
            | MatchKind::TypeOf(_)
            | MatchKind::Geo(_)
            | MatchKind::GeoNear(_)
            | MatchKind::TextSearch(_)
    )
}

/// True for a negation whose single child produces bounds; the bounds of
/// the child are complemented during translation.
pub fn is_bounds_generating_not(expr: &MatchExpression) -> bool {
    matches!(expr.kind(), MatchKind::Not)
        && expr
            .child(0)
            .is_some_and(node_can_use_index_on_own_field)
}

/// True if `expr` turns into index bounds directly: a bounds-producing
/// leaf, or a negation of one.
pub fn is_bounds_generating(expr: &MatchExpression) -> bool {
    is_bounds_generating_not(expr) || node_can_use_index_on_own_field(expr)
}

/// True for array operators whose children are indexed individually.
pub fn array_uses_index_on_children(expr: &MatchExpression) -> bool {
    matches!(
        expr.kind(),
        MatchKind::All | MatchKind::ElemMatchObject
    )
}
