//! Evaluator for predicate trees against in-memory features.
//!
//! Spatial predicates test the feature's geometry whatever property name
//! they carry. Coordinates are taken as planar metres, so DWITHIN compares
//! Euclidean distance against the distance converted to metres.

use geo::{Distance, Euclidean, Relate};
use geo_types::Geometry;
use serde_json::{Map, Value};
use std::cmp::Ordering;

use super::ast::{ComparisonOp, Literal, Predicate, SpatialRelation};

/// A feature as seen by the evaluator.
#[derive(Debug, Clone, Default)]
pub struct Feature {
    pub properties: Map<String, Value>,
    pub geometry: Option<Geometry<f64>>,
}

impl Feature {
    pub fn new(properties: Map<String, Value>, geometry: Option<Geometry<f64>>) -> Self {
        Feature {
            properties,
            geometry,
        }
    }
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = geojson::Error;

    fn try_from(feature: geojson::Feature) -> Result<Self, Self::Error> {
        let geometry = feature.geometry.map(Geometry::<f64>::try_from).transpose()?;
        Ok(Feature {
            properties: feature.properties.unwrap_or_default(),
            geometry,
        })
    }
}

/// Evaluate a predicate against a feature.
pub fn evaluate(predicate: &Predicate, feature: &Feature) -> bool {
    match predicate {
        Predicate::Comparison {
            property,
            op,
            value,
        } => match present(feature, property) {
            None => false,
            Some(actual) => compare_value(*op, actual, value),
        },

        Predicate::Between {
            property,
            lower,
            upper,
        } => match present(feature, property) {
            None => false,
            Some(actual) => {
                matches!(
                    order(actual, lower),
                    Some(Ordering::Greater | Ordering::Equal)
                ) && matches!(order(actual, upper), Some(Ordering::Less | Ordering::Equal))
            }
        },

        Predicate::IsNull { property } => present(feature, property).is_none(),

        Predicate::Not { child } => !evaluate(child, feature),

        Predicate::And { children } => children.iter().all(|c| evaluate(c, feature)),

        Predicate::Or { children } => children.iter().any(|c| evaluate(c, feature)),

        Predicate::Spatial { relation, .. } => match &feature.geometry {
            None => false,
            Some(geometry) => evaluate_spatial(relation, geometry),
        },
    }
}

/// Property value, with JSON null treated as absent.
fn present<'a>(feature: &'a Feature, property: &str) -> Option<&'a Value> {
    feature.properties.get(property).filter(|v| !v.is_null())
}

fn compare_value(op: ComparisonOp, actual: &Value, expected: &Literal) -> bool {
    if op == ComparisonOp::Like {
        return match (actual, expected) {
            (Value::String(s), Literal::Text(pattern)) => like_match(pattern, s),
            _ => false,
        };
    }

    let Some(ordering) = order(actual, expected) else {
        return false;
    };
    match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
        ComparisonOp::Like => false,
    }
}

/// Order a property value against a literal. Numeric literals compare
/// numerically with numbers and numeric strings; text literals compare
/// lexically with the value's text form.
fn order(actual: &Value, expected: &Literal) -> Option<Ordering> {
    match expected {
        Literal::Number(n) => {
            let actual = match actual {
                Value::Number(v) => v.as_f64()?,
                Value::String(s) => s.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            actual.partial_cmp(n)
        }
        Literal::Text(s) => match actual {
            Value::String(v) => Some(v.as_str().cmp(s.as_str())),
            Value::Number(v) => Some(v.to_string().as_str().cmp(s.as_str())),
            Value::Bool(v) => Some(v.to_string().as_str().cmp(s.as_str())),
            _ => None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternToken {
    AnyRun,
    AnyChar,
    Char(char),
}

/// Match `value` against a pattern in the tree dialect: `*` any run, `.` any
/// single character, `!` makes the next character literal.
pub fn like_match(pattern: &str, value: &str) -> bool {
    let mut tokens = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '!' => match chars.next() {
                Some(escaped) => tokens.push(PatternToken::Char(escaped)),
                None => tokens.push(PatternToken::Char('!')),
            },
            '*' => tokens.push(PatternToken::AnyRun),
            '.' => tokens.push(PatternToken::AnyChar),
            c => tokens.push(PatternToken::Char(c)),
        }
    }

    let text: Vec<char> = value.chars().collect();
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match tokens.get(p) {
            Some(PatternToken::AnyRun) => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(PatternToken::AnyChar) => {
                p += 1;
                t += 1;
            }
            Some(PatternToken::Char(c)) if *c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, consumed)) => {
                    p = star + 1;
                    t = consumed + 1;
                    backtrack = Some((star, consumed + 1));
                }
                None => return false,
            },
        }
    }

    tokens[p..].iter().all(|tok| *tok == PatternToken::AnyRun)
}

fn evaluate_spatial(relation: &SpatialRelation, geometry: &Geometry<f64>) -> bool {
    match relation {
        SpatialRelation::BBox { extent, .. } => {
            let area = Geometry::Polygon(extent.to_rect().to_polygon());
            geometry.relate(&area).is_intersects()
        }
        SpatialRelation::Intersects { geometry: other } => geometry.relate(other).is_intersects(),
        SpatialRelation::Within { geometry: other } => geometry.relate(other).is_within(),
        SpatialRelation::Contains { geometry: other } => geometry.relate(other).is_contains(),
        SpatialRelation::DWithin {
            geometry: other,
            distance,
            unit,
        } => Euclidean.distance(geometry, other) <= unit.to_meters(*distance),
    }
}
