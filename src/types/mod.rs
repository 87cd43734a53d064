//! # Planner Value Types
//!
//! Shared value-level types: the document [`Value`] model and its
//! [`TypeClass`] partition, which index-bounds translation uses for
//! type-bracketed range endpoints.

mod value;

pub use value::{TypeClass, Value};
