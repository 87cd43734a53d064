//! # Predicate Tree
//!
//! The canonicalized query predicate as a mutable tree of
//! [`MatchExpression`] nodes. Every node carries the same envelope (kind,
//! path, ordered children, optional index tag) so the planner can walk,
//! detach and re-parent children without caring which operator it is
//! holding; the operator-specific payload lives in [`MatchKind`].
//!
//! The access planner consumes this tree destructively: predicates answered
//! exactly by index bounds are dropped, covered predicates move onto scan
//! filters, and residuals move under fetch nodes. Detach is `take_child`,
//! destroy is letting the returned node drop.
//!
//! ## Node Categories
//!
//! - **Logical**: `And`, `Or`, `Not` - combine child predicates
//! - **Array**: `All`, `ElemMatchObject`, `ElemMatchValue` - per-element
//!   semantics over an array-valued path
//! - **Leaf**: comparisons, `In`, `Regex`, `Exists`, `TypeOf`, geo and text
//!   operators - constrain a single path

use crate::types::{TypeClass, Value};
use std::fmt;

use super::tag::IndexTag;

/// Geometry payload of a geo-within/geo-intersects predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoQuery {
    pub region: GeoRegion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GeoRegion {
    Box { low: (f64, f64), high: (f64, f64) },
    Circle { center: (f64, f64), radius: f64 },
    Polygon { vertices: Vec<(f64, f64)> },
}

/// Payload of a proximity predicate against a 2dsphere index.
#[derive(Debug, Clone, PartialEq)]
pub struct NearQuery {
    pub center: (f64, f64),
    pub min_distance: Option<f64>,
    pub max_distance: Option<f64>,
}

/// Payload of a full-text search predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct TextQuery {
    pub query: String,
    pub language: String,
}

/// Operator-specific payload of a predicate node.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchKind {
    And,
    Or,
    Not,
    All,
    ElemMatchObject,
    ElemMatchValue,
    Eq(Value),
    Lt(Value),
    Lte(Value),
    Gt(Value),
    Gte(Value),
    In(Vec<Value>),
    Regex { pattern: String },
    Exists(bool),
    TypeOf(TypeClass),
    Geo(GeoQuery),
    GeoNear(NearQuery),
    TextSearch(TextQuery),
}

impl MatchKind {
    pub fn name(&self) -> &'static str {
        match self {
            MatchKind::And => "and",
            MatchKind::Or => "or",
            MatchKind::Not => "not",
            MatchKind::All => "all",
            MatchKind::ElemMatchObject => "elemMatchObject",
            MatchKind::ElemMatchValue => "elemMatchValue",
            MatchKind::Eq(_) => "eq",
            MatchKind::Lt(_) => "lt",
            MatchKind::Lte(_) => "lte",
            MatchKind::Gt(_) => "gt",
            MatchKind::Gte(_) => "gte",
            MatchKind::In(_) => "in",
            MatchKind::Regex { .. } => "regex",
            MatchKind::Exists(_) => "exists",
            MatchKind::TypeOf(_) => "type",
            MatchKind::Geo(_) => "geo",
            MatchKind::GeoNear(_) => "geoNear",
            MatchKind::TextSearch(_) => "text",
        }
    }
}

/// One node of the predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchExpression {
    kind: MatchKind,
    path: String,
    children: Vec<MatchExpression>,
    tag: Option<IndexTag>,
}

impl MatchExpression {
    pub fn new(kind: MatchKind, path: impl Into<String>, children: Vec<MatchExpression>) -> Self {
        Self {
            kind,
            path: path.into(),
            children,
            tag: None,
        }
    }

    pub fn and(children: Vec<MatchExpression>) -> Self {
        Self::new(MatchKind::And, "", children)
    }

    pub fn or(children: Vec<MatchExpression>) -> Self {
        Self::new(MatchKind::Or, "", children)
    }

    pub fn not(child: MatchExpression) -> Self {
        Self::new(MatchKind::Not, "", vec![child])
    }

    pub fn all(path: impl Into<String>, children: Vec<MatchExpression>) -> Self {
        Self::new(MatchKind::All, path, children)
    }

    pub fn elem_match_object(path: impl Into<String>, child: MatchExpression) -> Self {
        Self::new(MatchKind::ElemMatchObject, path, vec![child])
    }

    pub fn elem_match_value(path: impl Into<String>, children: Vec<MatchExpression>) -> Self {
        Self::new(MatchKind::ElemMatchValue, path, children)
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(MatchKind::Eq(value.into()), path, Vec::new())
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(MatchKind::Lt(value.into()), path, Vec::new())
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(MatchKind::Lte(value.into()), path, Vec::new())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(MatchKind::Gt(value.into()), path, Vec::new())
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(MatchKind::Gte(value.into()), path, Vec::new())
    }

    pub fn in_set(path: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(MatchKind::In(values), path, Vec::new())
    }

    pub fn regex(path: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(
            MatchKind::Regex {
                pattern: pattern.into(),
            },
            path,
            Vec::new(),
        )
    }

    pub fn exists(path: impl Into<String>, should_exist: bool) -> Self {
        Self::new(MatchKind::Exists(should_exist), path, Vec::new())
    }

    pub fn type_of(path: impl Into<String>, class: TypeClass) -> Self {
        Self::new(MatchKind::TypeOf(class), path, Vec::new())
    }

    pub fn geo(path: impl Into<String>, query: GeoQuery) -> Self {
        Self::new(MatchKind::Geo(query), path, Vec::new())
    }

    pub fn geo_near(path: impl Into<String>, query: NearQuery) -> Self {
        Self::new(MatchKind::GeoNear(query), path, Vec::new())
    }

    pub fn text_search(query: impl Into<String>, language: impl Into<String>) -> Self {
        Self::new(
            MatchKind::TextSearch(TextQuery {
                query: query.into(),
                language: language.into(),
            }),
            "",
            Vec::new(),
        )
    }

    /// Tags this node with an index assignment. Builder-style, for
    /// assembling pre-tagged trees.
    pub fn with_tag(mut self, index: usize, position: usize) -> Self {
        self.tag = Some(IndexTag::new(index, position));
        self
    }

    pub fn kind(&self) -> &MatchKind {
        &self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn tag(&self) -> Option<&IndexTag> {
        self.tag.as_ref()
    }

    pub fn set_tag(&mut self, tag: Option<IndexTag>) {
        self.tag = tag;
    }

    pub fn children(&self) -> &[MatchExpression] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<MatchExpression> {
        &mut self.children
    }

    pub fn child(&self, index: usize) -> Option<&MatchExpression> {
        self.children.get(index)
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut MatchExpression> {
        self.children.get_mut(index)
    }

    pub fn num_children(&self) -> usize {
        self.children.len()
    }

    pub fn add_child(&mut self, child: MatchExpression) {
        self.children.push(child);
    }

    /// Detaches and returns the `index`-th child. Later children shift left,
    /// matching the planner's walk-and-detach loops.
    pub fn take_child(&mut self, index: usize) -> MatchExpression {
        self.children.remove(index)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self.kind, MatchKind::And | MatchKind::Or | MatchKind::Not)
    }

    pub fn is_array_operator(&self) -> bool {
        matches!(
            self.kind,
            MatchKind::All | MatchKind::ElemMatchObject | MatchKind::ElemMatchValue
        )
    }

    pub fn is_leaf(&self) -> bool {
        !self.is_logical() && !self.is_array_operator()
    }

    /// A no-op predicate: the empty conjunction, which matches everything.
    pub fn is_empty_and(&self) -> bool {
        matches!(self.kind, MatchKind::And) && self.children.is_empty()
    }
}

impl Default for MatchExpression {
    fn default() -> Self {
        Self::and(Vec::new())
    }
}

impl fmt::Display for MatchExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            MatchKind::And | MatchKind::Or | MatchKind::Not => {
                write!(f, "{}(", self.kind.name())?;
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            MatchKind::All | MatchKind::ElemMatchObject | MatchKind::ElemMatchValue => {
                write!(f, "{} {}(", self.path, self.kind.name())?;
                for (i, child) in self.children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            MatchKind::Eq(v) => write!(f, "{} = {}", self.path, v),
            MatchKind::Lt(v) => write!(f, "{} < {}", self.path, v),
            MatchKind::Lte(v) => write!(f, "{} <= {}", self.path, v),
            MatchKind::Gt(v) => write!(f, "{} > {}", self.path, v),
            MatchKind::Gte(v) => write!(f, "{} >= {}", self.path, v),
            MatchKind::In(values) => {
                write!(f, "{} in [", self.path)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            MatchKind::Regex { pattern } => write!(f, "{} =~ /{}/", self.path, pattern),
            MatchKind::Exists(e) => write!(f, "{} exists:{}", self.path, e),
            MatchKind::TypeOf(class) => write!(f, "{} type:{}", self.path, class.as_str()),
            MatchKind::Geo(_) => write!(f, "{} geo", self.path),
            MatchKind::GeoNear(_) => write!(f, "{} geoNear", self.path),
            MatchKind::TextSearch(t) => write!(f, "text(\"{}\")", t.query),
        }
    }
}
