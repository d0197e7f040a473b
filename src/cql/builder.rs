//! Resolves a postfix token stream into a predicate tree.
//!
//! Tokens are consumed from the end of the stream. Every operator resolves
//! its operands right to left, so asymmetric operators pick up their
//! arguments in reverse: value before property, upper bound before lower,
//! `maxy` first for BBOX.

use geo::CoordsIter;
use geo_types::Geometry;
use geozero::ToGeo;

use super::error::{CqlError, Result};
use super::grammar::{Token, TokenKind};
use super::wildcard::cql_to_internal;
use crate::config::ParserOptions;
use crate::filter::{
    ComparisonOp, DistanceUnit, Extent, Literal, Predicate, SpatialKind, SpatialRelation,
};

/// A resolved postfix entry: either a full predicate or one of the pieces
/// operators are built from.
#[derive(Debug)]
enum Operand {
    Predicate(Predicate),
    Property(String),
    Literal(Literal),
    Geometry(Geometry<f64>),
    Unit(DistanceUnit),
}

impl Operand {
    fn describe(&self) -> String {
        match self {
            Operand::Predicate(_) => "a predicate".to_string(),
            Operand::Property(name) => format!("property {name}"),
            Operand::Literal(Literal::Number(n)) => format!("number {n}"),
            Operand::Literal(Literal::Text(s)) => format!("string '{s}'"),
            Operand::Geometry(_) => "a geometry".to_string(),
            Operand::Unit(unit) => format!("unit {}", unit.keyword()),
        }
    }
}

/// Build a predicate tree from a postfix token stream.
///
/// The whole stream must be consumed; leftovers mean the grammar tables and
/// this builder disagree.
pub fn build_tree(postfix: Vec<Token>, options: &ParserOptions) -> Result<Predicate> {
    let mut builder = TreeBuilder {
        postfix,
        max_depth: options.max_depth,
        default_unit: options.default_unit,
    };

    let root = builder.resolve(0)?;
    if !builder.postfix.is_empty() {
        let remaining = builder
            .postfix
            .iter()
            .rev()
            .map(|t| format!("{}: {}", t.kind, t.text))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(CqlError::internal(format!(
            "remaining tokens after building tree: {remaining}"
        )));
    }

    match root {
        Operand::Predicate(predicate) => Ok(predicate),
        other => Err(CqlError::operand(
            "filter",
            format!("expected a predicate, found {}", other.describe()),
        )),
    }
}

struct TreeBuilder {
    postfix: Vec<Token>,
    max_depth: usize,
    default_unit: DistanceUnit,
}

impl TreeBuilder {
    fn resolve(&mut self, depth: usize) -> Result<Operand> {
        if depth > self.max_depth {
            return Err(CqlError::TooDeep {
                limit: self.max_depth,
            });
        }

        let token = self
            .postfix
            .pop()
            .ok_or_else(|| CqlError::internal("postfix stream ended while an operand was expected"))?;

        match token.kind {
            TokenKind::Value => parse_literal(&token.text).map(Operand::Literal),
            TokenKind::Property => Ok(Operand::Property(token.text)),
            TokenKind::Geometry => parse_geometry(&token.text).map(Operand::Geometry),
            TokenKind::Unit => DistanceUnit::from_cql(&token.text)
                .map(Operand::Unit)
                .ok_or_else(|| CqlError::internal(format!("no distance unit named {}", token.text))),
            TokenKind::IsNull => {
                let property = self.property(&token, depth)?;
                Ok(Operand::Predicate(Predicate::IsNull { property }))
            }
            TokenKind::Comparison => self.comparison(token, depth),
            TokenKind::Between => self.between(token, depth),
            TokenKind::Not => {
                let child = self.predicate(&token, depth)?;
                Ok(Operand::Predicate(Predicate::negate(child)))
            }
            TokenKind::Logical => self.logical(token, depth),
            TokenKind::Spatial => self.spatial(token, depth),
            TokenKind::LParen | TokenKind::RParen | TokenKind::Comma | TokenKind::End => {
                Err(CqlError::internal(format!(
                    "{} token at position {} has no place in a postfix stream",
                    token.kind, token.position
                )))
            }
        }
    }

    fn comparison(&mut self, token: Token, depth: usize) -> Result<Operand> {
        let op = ComparisonOp::from_cql(&token.text)
            .ok_or_else(|| CqlError::internal(format!("no comparison operator {}", token.text)))?;
        let value = self.literal(&token, depth)?;
        let property = self.property(&token, depth)?;

        let value = match (op, value) {
            (ComparisonOp::Like, Literal::Text(pattern)) => Literal::Text(cql_to_internal(&pattern)),
            (_, value) => value,
        };
        Ok(Operand::Predicate(Predicate::Comparison {
            property,
            op,
            value,
        }))
    }

    fn between(&mut self, token: Token, depth: usize) -> Result<Operand> {
        match self.postfix.pop() {
            Some(connector) if connector.is_and() => {}
            Some(other) => {
                return Err(CqlError::internal(format!(
                    "BETWEEN at position {} expected its AND connector, found {}: {}",
                    token.position, other.kind, other.text
                )));
            }
            None => {
                return Err(CqlError::internal(format!(
                    "BETWEEN at position {} has no connector",
                    token.position
                )));
            }
        }

        let upper = self.literal(&token, depth)?;
        let lower = self.literal(&token, depth)?;
        let property = self.property(&token, depth)?;
        Ok(Operand::Predicate(Predicate::Between {
            property,
            lower,
            upper,
        }))
    }

    /// `A AND B AND C` arrives as `A B AND C AND`; the chain of identical
    /// combinators is walked iteratively and spliced into one node.
    fn logical(&mut self, token: Token, depth: usize) -> Result<Operand> {
        let is_and = token.is_and();
        let mut reversed = Vec::new();
        let mut current = token;

        loop {
            let rhs = self.predicate(&current, depth)?;
            splice(&mut reversed, rhs, is_and);

            let chained = self
                .postfix
                .last()
                .is_some_and(|next| next.kind == TokenKind::Logical && next.is_and() == is_and);
            if chained {
                if let Some(next) = self.postfix.pop() {
                    current = next;
                }
                continue;
            }

            let lhs = self.predicate(&current, depth)?;
            splice(&mut reversed, lhs, is_and);
            break;
        }

        reversed.reverse();
        let predicate = if is_and {
            Predicate::And { children: reversed }
        } else {
            Predicate::Or { children: reversed }
        };
        Ok(Operand::Predicate(predicate))
    }

    fn spatial(&mut self, token: Token, depth: usize) -> Result<Operand> {
        let kind = SpatialKind::from_cql(&token.text)
            .ok_or_else(|| CqlError::internal(format!("no spatial function named {}", token.text)))?;

        let relation = match kind {
            SpatialKind::BBox => {
                let crs = match self.postfix.last() {
                    Some(next) if next.kind == TokenKind::Value && next.text.starts_with('\'') => {
                        match self.literal(&token, depth)? {
                            Literal::Text(crs) => Some(crs),
                            Literal::Number(_) => None,
                        }
                    }
                    _ => None,
                };
                let max_y = self.number(&token, depth)?;
                let max_x = self.number(&token, depth)?;
                let min_y = self.number(&token, depth)?;
                let min_x = self.number(&token, depth)?;
                SpatialRelation::BBox {
                    extent: Extent::new(min_x, min_y, max_x, max_y),
                    crs,
                }
            }
            SpatialKind::Intersects => SpatialRelation::Intersects {
                geometry: self.geometry(&token, depth)?,
            },
            SpatialKind::Within => SpatialRelation::Within {
                geometry: self.geometry(&token, depth)?,
            },
            SpatialKind::Contains => SpatialRelation::Contains {
                geometry: self.geometry(&token, depth)?,
            },
            SpatialKind::DWithin => {
                let unit = match self.postfix.last() {
                    Some(next) if next.kind == TokenKind::Unit => {
                        match self.resolve(depth + 1)? {
                            Operand::Unit(unit) => unit,
                            other => {
                                return Err(CqlError::internal(format!(
                                    "UNIT token resolved to {}",
                                    other.describe()
                                )));
                            }
                        }
                    }
                    _ => self.default_unit,
                };
                let distance = self.number(&token, depth)?;
                let geometry = self.geometry(&token, depth)?;
                SpatialRelation::DWithin {
                    geometry,
                    distance,
                    unit,
                }
            }
        };

        let property = self.property(&token, depth)?;
        Ok(Operand::Predicate(Predicate::Spatial { property, relation }))
    }

    fn predicate(&mut self, operator: &Token, depth: usize) -> Result<Predicate> {
        match self.resolve(depth + 1)? {
            Operand::Predicate(predicate) => Ok(predicate),
            other => Err(mismatch(operator, "a predicate", &other)),
        }
    }

    fn property(&mut self, operator: &Token, depth: usize) -> Result<String> {
        match self.resolve(depth + 1)? {
            Operand::Property(name) => Ok(name),
            other => Err(mismatch(operator, "a property name", &other)),
        }
    }

    fn literal(&mut self, operator: &Token, depth: usize) -> Result<Literal> {
        match self.resolve(depth + 1)? {
            Operand::Literal(value) => Ok(value),
            other => Err(mismatch(operator, "a literal value", &other)),
        }
    }

    fn number(&mut self, operator: &Token, depth: usize) -> Result<f64> {
        match self.resolve(depth + 1)? {
            Operand::Literal(Literal::Number(n)) => Ok(n),
            other => Err(mismatch(operator, "a number", &other)),
        }
    }

    fn geometry(&mut self, operator: &Token, depth: usize) -> Result<Geometry<f64>> {
        match self.resolve(depth + 1)? {
            Operand::Geometry(geometry) => Ok(geometry),
            other => Err(mismatch(operator, "a geometry literal", &other)),
        }
    }
}

fn mismatch(operator: &Token, expected: &str, found: &Operand) -> CqlError {
    CqlError::operand(
        operator.text.to_ascii_uppercase(),
        format!(
            "expected {expected} at position {}, found {}",
            operator.position,
            found.describe()
        ),
    )
}

/// Push `child` onto a reversed child list, splicing same-kind combinators.
fn splice(reversed: &mut Vec<Predicate>, child: Predicate, is_and: bool) {
    match child {
        Predicate::And { children } if is_and => reversed.extend(children.into_iter().rev()),
        Predicate::Or { children } if !is_and => reversed.extend(children.into_iter().rev()),
        other => reversed.push(other),
    }
}

/// Numbers parse as numbers; anything else is a quoted string with `''` escapes.
fn parse_literal(text: &str) -> Result<Literal> {
    if let Ok(n) = text.parse::<f64>() {
        if !n.is_finite() {
            return Err(CqlError::operand(
                "VALUE",
                format!("number {text} is out of range"),
            ));
        }
        return Ok(Literal::Number(n));
    }
    text.strip_prefix('\'')
        .and_then(|inner| inner.strip_suffix('\''))
        .map(|inner| Literal::Text(inner.replace("''", "'")))
        .ok_or_else(|| CqlError::internal(format!("VALUE token {text} is neither number nor string")))
}

fn parse_geometry(text: &str) -> Result<Geometry<f64>> {
    let normalized = text.to_ascii_uppercase();
    let geometry = geozero::wkt::Wkt(normalized.as_str())
        .to_geo()
        .map_err(|e| CqlError::Geometry {
            literal: text.to_string(),
            message: e.to_string(),
        })?;
    if !geometry
        .coords_iter()
        .all(|c| c.x.is_finite() && c.y.is_finite())
    {
        return Err(CqlError::Geometry {
            literal: text.to_string(),
            message: "coordinate out of range".to_string(),
        });
    }
    Ok(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cql::lexer::tokenize;
    use crate::cql::postfix::to_postfix;

    fn build(input: &str) -> Result<Predicate> {
        let postfix = to_postfix(tokenize(input)?)?;
        build_tree(postfix, &ParserOptions::default())
    }

    fn cmp(property: &str, op: ComparisonOp, value: impl Into<Literal>) -> Predicate {
        Predicate::comparison(property, op, value)
    }

    #[test]
    fn test_comparison_operand_order() {
        assert_eq!(
            build("lanes >= 2").unwrap(),
            cmp("lanes", ComparisonOp::Ge, 2.0)
        );
    }

    #[test]
    fn test_string_literal_unescapes_quotes() {
        assert_eq!(
            build("name = 'O''Brien'").unwrap(),
            cmp("name", ComparisonOp::Eq, "O'Brien")
        );
    }

    #[test]
    fn test_quoted_number_stays_text() {
        assert_eq!(
            build("code = '042'").unwrap(),
            cmp("code", ComparisonOp::Eq, "042")
        );
    }

    #[test]
    fn test_overflowing_number_is_operand_error() {
        assert!(matches!(build("a = 1e400"), Err(CqlError::Operand { .. })));
        assert!(matches!(
            build("BBOX(geom, 0, 0, 1e400, 1)"),
            Err(CqlError::Operand { .. })
        ));
        assert_eq!(
            build("a = 1e300").unwrap(),
            cmp("a", ComparisonOp::Eq, 1e300)
        );
    }

    #[test]
    fn test_overflowing_coordinate_is_geometry_error() {
        let err = build("INTERSECTS(geom, LINESTRING(0 0, 1 -1e999))").unwrap_err();
        assert!(matches!(err, CqlError::Geometry { .. }), "{err:?}");
        assert!(err.is_user_error());
    }

    #[test]
    fn test_between_bounds_keep_their_kinds() {
        assert_eq!(
            build("d BETWEEN '2020-01-01' AND 5").unwrap(),
            Predicate::Between {
                property: "d".into(),
                lower: "2020-01-01".into(),
                upper: 5.0.into(),
            }
        );
    }

    #[test]
    fn test_flattening_left_chain() {
        let tree = build("a = 1 AND b = 2 AND c = 3 AND d = 4").unwrap();
        match tree {
            Predicate::And { children } => {
                assert_eq!(children.len(), 4);
                assert_eq!(children[0], cmp("a", ComparisonOp::Eq, 1.0));
                assert_eq!(children[3], cmp("d", ComparisonOp::Eq, 4.0));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_flattening_right_nested_group() {
        let tree = build("a = 1 OR (b = 2 OR c = 3)").unwrap();
        assert_eq!(
            tree,
            Predicate::Or {
                children: vec![
                    cmp("a", ComparisonOp::Eq, 1.0),
                    cmp("b", ComparisonOp::Eq, 2.0),
                    cmp("c", ComparisonOp::Eq, 3.0),
                ]
            }
        );
    }

    #[test]
    fn test_mixed_combinators_nest() {
        let tree = build("a = 1 AND (b = 2 OR c = 3) AND d = 4").unwrap();
        match tree {
            Predicate::And { children } => {
                assert_eq!(children.len(), 3);
                assert!(matches!(&children[1], Predicate::Or { children } if children.len() == 2));
            }
            other => panic!("expected And, got {other:?}"),
        }
    }

    #[test]
    fn test_bbox_with_crs() {
        assert_eq!(
            build("BBOX(the_geom, -10, -5.5, 10, 5.5, 'EPSG:2056')").unwrap(),
            Predicate::Spatial {
                property: "the_geom".into(),
                relation: SpatialRelation::BBox {
                    extent: Extent::new(-10.0, -5.5, 10.0, 5.5),
                    crs: Some("EPSG:2056".into()),
                },
            }
        );
    }

    #[test]
    fn test_dwithin_default_and_explicit_unit() {
        let point = Geometry::Point(geo_types::point!(x: 1.0, y: 2.0));

        assert_eq!(
            build("DWITHIN(geom, POINT(1 2), 100)").unwrap(),
            Predicate::Spatial {
                property: "geom".into(),
                relation: SpatialRelation::DWithin {
                    geometry: point.clone(),
                    distance: 100.0,
                    unit: DistanceUnit::Meters,
                },
            }
        );
        assert_eq!(
            build("DWITHIN(geom, point(1 2), 2, kilometers)").unwrap(),
            Predicate::Spatial {
                property: "geom".into(),
                relation: SpatialRelation::DWithin {
                    geometry: point,
                    distance: 2.0,
                    unit: DistanceUnit::Kilometers,
                },
            }
        );
    }

    #[test]
    fn test_bbox_rejects_text_coordinates() {
        let err = build("BBOX(geom, 'a', 0, 1, 1)").unwrap_err();
        assert!(matches!(err, CqlError::Operand { .. }));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_invalid_wkt_is_geometry_error() {
        let err = build("INTERSECTS(geom, POINT(1))").unwrap_err();
        assert!(matches!(err, CqlError::Geometry { .. }));
    }

    #[test]
    fn test_depth_limit() {
        let options = ParserOptions {
            max_depth: 3,
            ..ParserOptions::default()
        };
        let postfix = to_postfix(tokenize("NOT(NOT(NOT(NOT(a = 1))))").unwrap()).unwrap();
        assert_eq!(
            build_tree(postfix, &options).unwrap_err(),
            CqlError::TooDeep { limit: 3 }
        );
    }

    #[test]
    fn test_long_flat_chain_is_not_deep() {
        let options = ParserOptions {
            max_depth: 4,
            ..ParserOptions::default()
        };
        let text = (0..200)
            .map(|i| format!("p{i} = {i}"))
            .collect::<Vec<_>>()
            .join(" OR ");
        let postfix = to_postfix(tokenize(&text).unwrap()).unwrap();
        match build_tree(postfix, &options).unwrap() {
            Predicate::Or { children } => assert_eq!(children.len(), 200),
            other => panic!("expected Or, got {other:?}"),
        }
    }

    #[test]
    fn test_leftover_tokens_are_internal() {
        let postfix = vec![
            Token::new(TokenKind::Property, "a", 0),
            Token::new(TokenKind::Property, "b", 2),
            Token::new(TokenKind::IsNull, "IS NULL", 4),
        ];
        let err = build_tree(postfix, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, CqlError::Internal(_)));
    }

    #[test]
    fn test_between_asserts_connector() {
        let postfix = vec![
            Token::new(TokenKind::Property, "h", 0),
            Token::new(TokenKind::Value, "1", 10),
            Token::new(TokenKind::Value, "2", 16),
            Token::new(TokenKind::Logical, "OR", 12),
            Token::new(TokenKind::Between, "BETWEEN", 2),
        ];
        let err = build_tree(postfix, &ParserOptions::default()).unwrap_err();
        assert!(matches!(err, CqlError::Internal(_)));
    }
}
