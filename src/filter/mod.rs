//! Predicate trees for constraining feature queries.
//!
//! A tree is what `cql::read` produces and `cql::write` consumes:
//!   Comparison  - `property op value` with op in ==, !=, <, <=, >, >=, like
//!   Between     - `property BETWEEN lower AND upper`
//!   IsNull      - `property IS NULL`
//!   Not         - negation of one child
//!   And / Or    - two or more children, never directly nesting their own kind
//!   Spatial     - BBOX, INTERSECTS, WITHIN, CONTAINS, DWITHIN on a geometry property

mod ast;
mod descriptor;
mod eval;
mod request;

pub use ast::*;
pub use descriptor::{
    Arity, FilterDescriptor, FilterTag, ValueKind, descriptor, descriptors, descriptors_for,
};
pub use eval::{Feature, evaluate, like_match};
pub use request::restrict_to_area;
