//! Point-in-polygon containment.

use std::collections::HashSet;

use geo::Intersects;

use crate::analysis::RunControl;
use crate::anomaly::{AnomalyKind, Finding, Measure};
use crate::error::Result;
use crate::index::IndexedLayer;

/// Id fields used to match points to polygons without geometry.
#[derive(Debug, Clone, Copy)]
pub struct IdMatch<'a> {
    pub point_field: &'a str,
    pub polygon_field: &'a str,
}

/// Points covered by no polygon (boundary counts as covered) and not
/// matched to any polygon by id.
pub fn detect_orphan_points(
    points: &IndexedLayer,
    polygons: &IndexedLayer,
    id_match: Option<IdMatch<'_>>,
    control: &RunControl,
) -> Result<Vec<Finding>> {
    let polygon_ids: HashSet<String> = match id_match {
        Some(m) => polygons
            .features
            .iter()
            .filter_map(|f| f.attribute_key(m.polygon_field))
            .collect(),
        None => HashSet::new(),
    };

    let mut findings = Vec::new();
    let total = points.len();

    for (i, feature) in points.features.iter().enumerate() {
        let Some(point) = feature.geometry.as_point() else {
            continue;
        };

        let mut covered = false;
        for j in polygons.index.query_around(point.0, 0.0) {
            control.checkpoint()?;
            if let Some(polygon) = polygons.features[j].geometry.as_polygon() {
                if polygon.intersects(point) {
                    covered = true;
                    break;
                }
            }
        }
        let matched = covered
            || id_match
                .and_then(|m| feature.attribute_key(m.point_field))
                .is_some_and(|id| polygon_ids.contains(&id));
        if !matched {
            findings.push(
                Finding::single(AnomalyKind::OrphanPoint, points.keys[i].clone(), Measure::Unmeasured)
                    .with_conflict(*point),
            );
        }
        control.progress("containment", i + 1, total);
    }

    Ok(findings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Crs, Feature, Geometry, LayerId};

    fn parcels() -> IndexedLayer {
        IndexedLayer::build(
            LayerId::from("parcels"),
            vec![Feature::new("p1", Geometry::rect((0.0, 0.0), (10.0, 10.0), Crs::default()))
                .with_attribute("num", "A1")],
        )
    }

    fn markers(points: &[(&str, f64, f64, Option<&str>)]) -> IndexedLayer {
        let features = points
            .iter()
            .map(|(id, x, y, num)| {
                let f = Feature::new(*id, Geometry::point(*x, *y, Crs::default()));
                match num {
                    Some(n) => f.with_attribute("parcel", *n),
                    None => f,
                }
            })
            .collect();
        IndexedLayer::build(LayerId::from("markers"), features)
    }

    #[test]
    fn test_boundary_point_is_covered() {
        let points = markers(&[("in", 5.0, 5.0, None), ("edge", 10.0, 5.0, None), ("out", 20.0, 5.0, None)]);
        let findings = detect_orphan_points(&points, &parcels(), None, &RunControl::new()).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].primary.feature.as_str(), "out");
    }

    #[test]
    fn test_id_match_rescues_outside_point() {
        let points = markers(&[("out", 20.0, 5.0, Some("A1")), ("lost", 30.0, 5.0, Some("Z9"))]);
        let id_match = IdMatch {
            point_field: "parcel",
            polygon_field: "num",
        };
        let findings = detect_orphan_points(&points, &parcels(), Some(id_match), &RunControl::new()).unwrap();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].primary.feature.as_str(), "lost");
    }
}
