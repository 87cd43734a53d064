//! Index tag annotations attached to predicate nodes by the plan enumerator.

use std::fmt;

/// The enumerator's index assignment for one predicate node: which catalog
/// index to use and which key field of that index the predicate constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexTag {
    index: usize,
    position: usize,
}

impl IndexTag {
    pub fn new(index: usize, position: usize) -> Self {
        Self { index, position }
    }

    /// Ordinal of the chosen index in the catalog slice handed to the planner.
    pub fn index(&self) -> usize {
        self.index
    }

    /// 0-based offset of the key field within the chosen compound index.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for IndexTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.index, self.position)
    }
}
