//! Serializes predicate trees to canonical CQL text.

use geozero::ToWkt;

use super::error::{CqlError, Result};
use super::wildcard::internal_to_cql;
use crate::filter::{Arity, ComparisonOp, Literal, Predicate, SpatialRelation, descriptor};

/// Write `predicate` as CQL, refusing trees deeper than `max_depth`.
pub fn write_predicate(predicate: &Predicate, max_depth: usize) -> Result<String> {
    let mut out = String::new();
    write_into(&mut out, predicate, 0, max_depth)?;
    Ok(out)
}

fn write_into(out: &mut String, predicate: &Predicate, depth: usize, max_depth: usize) -> Result<()> {
    if depth >= max_depth {
        return Err(CqlError::TooDeep { limit: max_depth });
    }

    let entry = descriptor(predicate.tag());
    match (entry.arity, predicate) {
        (Arity::SingleValue, Predicate::Comparison { property, op, value }) => {
            let value = match (op, value) {
                (ComparisonOp::Like, Literal::Text(pattern)) => {
                    Literal::Text(internal_to_cql(pattern))
                }
                _ => value.clone(),
            };
            out.push_str(property);
            out.push(' ');
            out.push_str(entry.keyword);
            out.push(' ');
            push_literal(out, &value)?;
        }
        (Arity::TwoValue, Predicate::Between { property, lower, upper }) => {
            out.push_str(property);
            out.push_str(" BETWEEN ");
            push_literal(out, lower)?;
            out.push_str(" AND ");
            push_literal(out, upper)?;
        }
        (Arity::NullValue, Predicate::IsNull { property }) => {
            out.push_str(property);
            out.push_str(" IS NULL");
        }
        (Arity::Negation, Predicate::Not { child }) => {
            out.push_str("NOT(");
            write_into(out, child, depth + 1, max_depth)?;
            out.push(')');
        }
        (Arity::Logical, Predicate::And { children } | Predicate::Or { children }) => {
            if children.len() < 2 {
                return Err(CqlError::internal(format!(
                    "{} needs at least two children, found {}",
                    entry.keyword,
                    children.len()
                )));
            }
            out.push('(');
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                    out.push_str(entry.keyword);
                    out.push(' ');
                }
                write_into(out, child, depth + 1, max_depth)?;
            }
            out.push(')');
        }
        (Arity::Spatial, Predicate::Spatial { property, relation }) => {
            out.push_str(entry.keyword);
            out.push('(');
            out.push_str(property);
            out.push_str(", ");
            push_relation(out, relation)?;
            out.push(')');
        }
        (arity, other) => {
            return Err(CqlError::internal(format!(
                "descriptor {:?} has arity {:?}, which cannot write {:?}",
                entry.tag, arity, other
            )));
        }
    }
    Ok(())
}

fn push_relation(out: &mut String, relation: &SpatialRelation) -> Result<()> {
    match relation {
        SpatialRelation::BBox { extent, crs } => {
            let coords = extent
                .to_array()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&coords);
            if let Some(crs) = crs {
                out.push_str(", ");
                push_literal(out, &Literal::Text(crs.clone()))?;
            }
        }
        SpatialRelation::Intersects { geometry }
        | SpatialRelation::Within { geometry }
        | SpatialRelation::Contains { geometry } => {
            out.push_str(&wkt(geometry)?);
        }
        SpatialRelation::DWithin {
            geometry,
            distance,
            unit,
        } => {
            out.push_str(&wkt(geometry)?);
            out.push_str(", ");
            out.push_str(&distance.to_string());
            out.push_str(", ");
            out.push_str(unit.keyword());
        }
    }
    Ok(())
}

fn wkt(geometry: &geo_types::Geometry<f64>) -> Result<String> {
    geometry.to_wkt().map_err(|e| CqlError::Geometry {
        literal: format!("{geometry:?}"),
        message: e.to_string(),
    })
}

/// Numbers as written by `f64`'s shortest round-trip form; strings quoted
/// with `'` and inner quotes doubled.
fn push_literal(out: &mut String, value: &Literal) -> Result<()> {
    match value {
        Literal::Number(n) if !n.is_finite() => {
            return Err(CqlError::internal(format!("{n} has no CQL spelling")));
        }
        Literal::Number(n) => out.push_str(&n.to_string()),
        Literal::Text(s) => {
            out.push('\'');
            out.push_str(&s.replace('\'', "''"));
            out.push('\'');
        }
    }
    Ok(())
}
