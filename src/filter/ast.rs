//! Predicate tree exchanged with map clients and filter editors.

use geo_types::Geometry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Root filter expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Predicate {
    /// Binary comparison: `name = 'x'`, `lanes >= 2`, `name LIKE 'a%'`
    Comparison {
        property: String,
        op: ComparisonOp,
        value: Literal,
    },

    /// Range test: `height BETWEEN 10 AND 20`
    Between {
        property: String,
        lower: Literal,
        upper: Literal,
    },

    /// Null test: `name IS NULL`
    IsNull { property: String },

    /// Negation: `NOT(expr)`
    Not { child: Box<Predicate> },

    /// Conjunction of two or more children, never directly containing another `And`.
    And { children: Vec<Predicate> },

    /// Disjunction of two or more children, never directly containing another `Or`.
    Or { children: Vec<Predicate> },

    /// Spatial relation between a geometry property and a literal.
    Spatial {
        property: String,
        relation: SpatialRelation,
    },
}

/// A scalar operand: CQL numbers and quoted strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    Text(String),
}

impl Literal {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Literal::Text(s) => Some(s),
            Literal::Number(_) => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Literal::Number(n) => Some(*n),
            Literal::Text(_) => None,
        }
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Number(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::Text(value.to_string())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Literal::Text(value)
    }
}

/// Comparison operator, named the way the tree stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "like")]
    Like,
}

impl ComparisonOp {
    /// Map a CQL comparison keyword (`=`, `<>`, `LIKE`, ...) to the tree operator.
    pub fn from_cql(keyword: &str) -> Option<Self> {
        let op = match keyword.to_ascii_uppercase().as_str() {
            "=" => ComparisonOp::Eq,
            "<>" => ComparisonOp::Ne,
            "<" => ComparisonOp::Lt,
            "<=" => ComparisonOp::Le,
            ">" => ComparisonOp::Gt,
            ">=" => ComparisonOp::Ge,
            "LIKE" => ComparisonOp::Like,
            _ => return None,
        };
        Some(op)
    }

    /// Operator as the tree names it (`==`, `!=`, ..., `like`).
    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOp::Eq => "==",
            ComparisonOp::Ne => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Like => "like",
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Spatial relation and its literal operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SpatialRelation {
    BBox {
        extent: Extent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<String>,
    },
    Intersects {
        #[serde(with = "wkt_serde")]
        geometry: Geometry<f64>,
    },
    Within {
        #[serde(with = "wkt_serde")]
        geometry: Geometry<f64>,
    },
    Contains {
        #[serde(with = "wkt_serde")]
        geometry: Geometry<f64>,
    },
    DWithin {
        #[serde(with = "wkt_serde")]
        geometry: Geometry<f64>,
        distance: f64,
        unit: DistanceUnit,
    },
}

impl SpatialRelation {
    pub fn kind(&self) -> SpatialKind {
        match self {
            SpatialRelation::BBox { .. } => SpatialKind::BBox,
            SpatialRelation::Intersects { .. } => SpatialKind::Intersects,
            SpatialRelation::Within { .. } => SpatialKind::Within,
            SpatialRelation::Contains { .. } => SpatialKind::Contains,
            SpatialRelation::DWithin { .. } => SpatialKind::DWithin,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialKind {
    BBox,
    Intersects,
    Within,
    Contains,
    DWithin,
}

impl SpatialKind {
    /// Map a CQL spatial function name to its kind.
    pub fn from_cql(keyword: &str) -> Option<Self> {
        let kind = match keyword.to_ascii_uppercase().as_str() {
            "BBOX" => SpatialKind::BBox,
            "INTERSECTS" => SpatialKind::Intersects,
            "WITHIN" => SpatialKind::Within,
            "CONTAINS" => SpatialKind::Contains,
            "DWITHIN" => SpatialKind::DWithin,
            _ => return None,
        };
        Some(kind)
    }

    /// Number of arguments the CQL function takes, property included.
    pub fn arity(&self) -> RangeInclusive<usize> {
        match self {
            SpatialKind::BBox => 5..=6,
            SpatialKind::Intersects | SpatialKind::Within | SpatialKind::Contains => 2..=2,
            SpatialKind::DWithin => 3..=4,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            SpatialKind::BBox => "BBOX",
            SpatialKind::Intersects => "INTERSECTS",
            SpatialKind::Within => "WITHIN",
            SpatialKind::Contains => "CONTAINS",
            SpatialKind::DWithin => "DWITHIN",
        }
    }
}

/// Box extent in the order BBOX spells it: minx, miny, maxx, maxy.
///
/// Coordinates are kept as written; no min/max normalization happens here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Extent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Extent {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn to_rect(&self) -> geo_types::Rect<f64> {
        geo_types::Rect::new(
            geo_types::coord! { x: self.min_x, y: self.min_y },
            geo_types::coord! { x: self.max_x, y: self.max_y },
        )
    }
}

/// Distance unit accepted by DWITHIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Meters,
    Kilometers,
    Feet,
    StatuteMiles,
    NauticalMiles,
}

impl DistanceUnit {
    /// Parse a CQL unit keyword. Whitespace inside two-word units is collapsed.
    pub fn from_cql(keyword: &str) -> Option<Self> {
        let normalized = keyword
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();
        let unit = match normalized.as_str() {
            "meters" | "metres" => DistanceUnit::Meters,
            "kilometers" | "kilometres" => DistanceUnit::Kilometers,
            "feet" => DistanceUnit::Feet,
            "statute miles" => DistanceUnit::StatuteMiles,
            "nautical miles" => DistanceUnit::NauticalMiles,
            _ => return None,
        };
        Some(unit)
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            DistanceUnit::Meters => "meters",
            DistanceUnit::Kilometers => "kilometers",
            DistanceUnit::Feet => "feet",
            DistanceUnit::StatuteMiles => "statute miles",
            DistanceUnit::NauticalMiles => "nautical miles",
        }
    }

    pub fn to_meters(&self, distance: f64) -> f64 {
        match self {
            DistanceUnit::Meters => distance,
            DistanceUnit::Kilometers => distance * 1000.0,
            DistanceUnit::Feet => distance * 0.3048,
            DistanceUnit::StatuteMiles => distance * 1609.344,
            DistanceUnit::NauticalMiles => distance * 1852.0,
        }
    }
}

impl std::str::FromStr for DistanceUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        DistanceUnit::from_cql(&value.replace('_', " "))
            .ok_or_else(|| format!("invalid distance unit: {value}"))
    }
}

impl Predicate {
    pub fn comparison(property: impl Into<String>, op: ComparisonOp, value: impl Into<Literal>) -> Self {
        Predicate::Comparison {
            property: property.into(),
            op,
            value: value.into(),
        }
    }

    pub fn negate(child: Predicate) -> Self {
        Predicate::Not {
            child: Box::new(child),
        }
    }

    /// Build an `And` from `children`, splicing any child that is itself an `And`.
    pub fn all(children: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for child in children {
            match child {
                Predicate::And { children: inner } => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Predicate::And { children: flat }
    }

    /// Build an `Or` from `children`, splicing any child that is itself an `Or`.
    pub fn any(children: impl IntoIterator<Item = Predicate>) -> Self {
        let mut flat = Vec::new();
        for child in children {
            match child {
                Predicate::Or { children: inner } => flat.extend(inner),
                other => flat.push(other),
            }
        }
        Predicate::Or { children: flat }
    }

    /// Maximum nesting depth of the tree; a leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Predicate::Not { child } => 1 + child.depth(),
            Predicate::And { children } | Predicate::Or { children } => {
                1 + children.iter().map(Predicate::depth).max().unwrap_or(0)
            }
            _ => 1,
        }
    }
}

/// Serde adapter storing geometries as WKT text.
mod wkt_serde {
    use geo_types::Geometry;
    use geozero::{ToGeo, ToWkt};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};

    pub fn serialize<S: Serializer>(geometry: &Geometry<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        let text = geometry.to_wkt().map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Geometry<f64>, D::Error> {
        let text = String::deserialize(deserializer)?;
        geozero::wkt::Wkt(text.as_str())
            .to_geo()
            .map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(property: &str, value: f64) -> Predicate {
        Predicate::comparison(property, ComparisonOp::Eq, value)
    }

    #[test]
    fn test_all_splices_nested_and() {
        let inner = Predicate::all([eq("a", 1.0), eq("b", 2.0)]);
        let outer = Predicate::all([inner, eq("c", 3.0)]);
        match outer {
            Predicate::And { children } => assert_eq!(children.len(), 3),
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_any_keeps_nested_and() {
        let inner = Predicate::all([eq("a", 1.0), eq("b", 2.0)]);
        let outer = Predicate::any([inner, eq("c", 3.0)]);
        match outer {
            Predicate::Or { children } => {
                assert_eq!(children.len(), 2);
                assert!(matches!(children[0], Predicate::And { .. }));
            }
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_comparison_keywords() {
        assert_eq!(ComparisonOp::from_cql("<>"), Some(ComparisonOp::Ne));
        assert_eq!(ComparisonOp::from_cql("like"), Some(ComparisonOp::Like));
        assert_eq!(ComparisonOp::from_cql("!="), None);
        assert_eq!(ComparisonOp::Ge.to_string(), ">=");
    }

    #[test]
    fn test_distance_units() {
        assert_eq!(
            DistanceUnit::from_cql("Statute  Miles"),
            Some(DistanceUnit::StatuteMiles)
        );
        assert_eq!(
            "nautical_miles".parse::<DistanceUnit>(),
            Ok(DistanceUnit::NauticalMiles)
        );
        assert_eq!(DistanceUnit::Kilometers.to_meters(1.5), 1500.0);
    }

    #[test]
    fn test_depth() {
        let tree = Predicate::negate(Predicate::any([eq("a", 1.0), eq("b", 2.0)]));
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn test_json_shape() {
        let tree = Predicate::Spatial {
            property: "geom".into(),
            relation: SpatialRelation::Intersects {
                geometry: Geometry::Point(geo_types::point!(x: 1.0, y: 2.0)),
            },
        };
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "spatial");
        assert_eq!(json["relation"]["kind"], "intersects");

        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
    }
}
