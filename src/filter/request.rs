//! Helpers for feature requests built around a stored filter.

use geo_types::Geometry;

use super::ast::{Predicate, SpatialRelation};

/// Restrict `filter` to features whose `geometry_property` intersects `area`.
///
/// With no filter the area test stands alone; an existing `And` gains the
/// area test as one more child instead of being nested.
pub fn restrict_to_area(
    filter: Option<Predicate>,
    geometry_property: &str,
    area: Geometry<f64>,
) -> Predicate {
    let area_test = Predicate::Spatial {
        property: geometry_property.to_string(),
        relation: SpatialRelation::Intersects { geometry: area },
    };
    match filter {
        None => area_test,
        Some(filter) => Predicate::all([filter, area_test]),
    }
}
