//! Static metadata for every predicate kind.
//!
//! The writer dispatches on the arity class and keyword; filter editors use
//! the table to offer only the operators legal for a property's value kind.

use serde::Serialize;

use super::ast::{ComparisonOp, Predicate, SpatialKind};

/// Identifies one row of the descriptor table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterTag {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
    Like,
    Between,
    IsNull,
    Not,
    And,
    Or,
    BBox,
    Intersects,
    Within,
    Contains,
    DWithin,
}

/// Shape of the operands a predicate kind takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Arity {
    SingleValue,
    TwoValue,
    NullValue,
    Negation,
    Logical,
    Spatial,
}

/// Kind of value a property holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueKind {
    String,
    Int,
    Number,
    Date,
    DateTime,
    Geometry,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FilterDescriptor {
    pub tag: FilterTag,
    /// Operator name as stored in the tree (`==`, `like`, `bbox`, ...).
    pub canonical: &'static str,
    /// CQL spelling.
    pub keyword: &'static str,
    pub label: &'static str,
    pub arity: Arity,
    /// Property kinds the predicate is legal against; empty for combinators.
    pub value_kinds: &'static [ValueKind],
}

impl FilterDescriptor {
    pub fn accepts(&self, kind: ValueKind) -> bool {
        self.value_kinds.contains(&kind)
    }
}

const ALL_SCALARS: &[ValueKind] = &[
    ValueKind::String,
    ValueKind::Int,
    ValueKind::Number,
    ValueKind::Date,
    ValueKind::DateTime,
];

const ORDERED: &[ValueKind] = &[
    ValueKind::Int,
    ValueKind::Number,
    ValueKind::Date,
    ValueKind::DateTime,
];

const GEOMETRY: &[ValueKind] = &[ValueKind::Geometry];

const fn row(
    tag: FilterTag,
    canonical: &'static str,
    keyword: &'static str,
    label: &'static str,
    arity: Arity,
    value_kinds: &'static [ValueKind],
) -> FilterDescriptor {
    FilterDescriptor {
        tag,
        canonical,
        keyword,
        label,
        arity,
        value_kinds,
    }
}

static DESCRIPTORS: [FilterDescriptor; 17] = [
    row(FilterTag::EqualTo, "==", "=", "is equal to", Arity::SingleValue, ALL_SCALARS),
    row(FilterTag::NotEqualTo, "!=", "<>", "is not equal to", Arity::SingleValue, ALL_SCALARS),
    row(FilterTag::LessThan, "<", "<", "is less than", Arity::SingleValue, ORDERED),
    row(FilterTag::LessThanOrEqualTo, "<=", "<=", "is less than or equal to", Arity::SingleValue, ORDERED),
    row(FilterTag::GreaterThan, ">", ">", "is greater than", Arity::SingleValue, ORDERED),
    row(FilterTag::GreaterThanOrEqualTo, ">=", ">=", "is greater than or equal to", Arity::SingleValue, ORDERED),
    row(FilterTag::Like, "like", "LIKE", "is like", Arity::SingleValue, &[ValueKind::String]),
    row(FilterTag::Between, "between", "BETWEEN", "is between", Arity::TwoValue, ORDERED),
    row(FilterTag::IsNull, "null", "IS NULL", "is empty", Arity::NullValue, ALL_SCALARS),
    row(FilterTag::Not, "!", "NOT", "not", Arity::Negation, &[]),
    row(FilterTag::And, "&&", "AND", "all of", Arity::Logical, &[]),
    row(FilterTag::Or, "||", "OR", "any of", Arity::Logical, &[]),
    row(FilterTag::BBox, "bbox", "BBOX", "inside box", Arity::Spatial, GEOMETRY),
    row(FilterTag::Intersects, "intersects", "INTERSECTS", "intersects", Arity::Spatial, GEOMETRY),
    row(FilterTag::Within, "within", "WITHIN", "is within", Arity::Spatial, GEOMETRY),
    row(FilterTag::Contains, "contains", "CONTAINS", "contains", Arity::Spatial, GEOMETRY),
    row(FilterTag::DWithin, "dwithin", "DWITHIN", "is within distance of", Arity::Spatial, GEOMETRY),
];

/// Look up the descriptor row for `tag`.
pub fn descriptor(tag: FilterTag) -> &'static FilterDescriptor {
    let index = match tag {
        FilterTag::EqualTo => 0,
        FilterTag::NotEqualTo => 1,
        FilterTag::LessThan => 2,
        FilterTag::LessThanOrEqualTo => 3,
        FilterTag::GreaterThan => 4,
        FilterTag::GreaterThanOrEqualTo => 5,
        FilterTag::Like => 6,
        FilterTag::Between => 7,
        FilterTag::IsNull => 8,
        FilterTag::Not => 9,
        FilterTag::And => 10,
        FilterTag::Or => 11,
        FilterTag::BBox => 12,
        FilterTag::Intersects => 13,
        FilterTag::Within => 14,
        FilterTag::Contains => 15,
        FilterTag::DWithin => 16,
    };
    &DESCRIPTORS[index]
}

/// The whole table, in display order.
pub fn descriptors() -> &'static [FilterDescriptor] {
    &DESCRIPTORS
}

/// Rows legal against a property holding `kind` values.
pub fn descriptors_for(kind: ValueKind) -> impl Iterator<Item = &'static FilterDescriptor> {
    DESCRIPTORS.iter().filter(move |d| d.accepts(kind))
}

impl From<ComparisonOp> for FilterTag {
    fn from(op: ComparisonOp) -> Self {
        match op {
            ComparisonOp::Eq => FilterTag::EqualTo,
            ComparisonOp::Ne => FilterTag::NotEqualTo,
            ComparisonOp::Lt => FilterTag::LessThan,
            ComparisonOp::Le => FilterTag::LessThanOrEqualTo,
            ComparisonOp::Gt => FilterTag::GreaterThan,
            ComparisonOp::Ge => FilterTag::GreaterThanOrEqualTo,
            ComparisonOp::Like => FilterTag::Like,
        }
    }
}

impl From<SpatialKind> for FilterTag {
    fn from(kind: SpatialKind) -> Self {
        match kind {
            SpatialKind::BBox => FilterTag::BBox,
            SpatialKind::Intersects => FilterTag::Intersects,
            SpatialKind::Within => FilterTag::Within,
            SpatialKind::Contains => FilterTag::Contains,
            SpatialKind::DWithin => FilterTag::DWithin,
        }
    }
}

impl Predicate {
    pub fn tag(&self) -> FilterTag {
        match self {
            Predicate::Comparison { op, .. } => (*op).into(),
            Predicate::Between { .. } => FilterTag::Between,
            Predicate::IsNull { .. } => FilterTag::IsNull,
            Predicate::Not { .. } => FilterTag::Not,
            Predicate::And { .. } => FilterTag::And,
            Predicate::Or { .. } => FilterTag::Or,
            Predicate::Spatial { relation, .. } => relation.kind().into(),
        }
    }
}
