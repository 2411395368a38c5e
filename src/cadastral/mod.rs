//! Cadastral Topology
//!
//! Point and polygon consistency for land parcels surveyed as boundary
//! markers. Points are tied to parcels through id fields, then four
//! independent checks run in a fixed order:
//!
//! 1. association: every point maps to exactly one parcel, every parcel has
//!    points
//! 2. vertex count: a parcel has as many markers as exterior vertices
//! 3. vertex precision: each marker sits on a parcel vertex
//! 4. shared vertices: parcels sharing a boundary stretch both have vertices
//!    at its ends

mod association;

use geo::{Line, MultiPoint, Point};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::RunControl;
use crate::anomaly::{AnomalyKind, Finding, Measure};
use crate::error::{QcError, Result};
use crate::geometry::predicates::{coord_distance, dedup_coords, exterior_vertices, is_vertex_of, shared_pieces};
use crate::index::IndexedLayer;
use crate::model::FieldSchema;

pub use association::{Association, PointLink};

/// Default distance under which a marker counts as sitting on a vertex.
pub const DEFAULT_COORDINATE_TOLERANCE: f64 = 0.001;

/// Id fields tying markers to parcels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadastralFields {
    pub point_field: String,
    pub polygon_field: String,
}

impl CadastralFields {
    pub fn new(point_field: impl Into<String>, polygon_field: impl Into<String>) -> Self {
        Self {
            point_field: point_field.into(),
            polygon_field: polygon_field.into(),
        }
    }

    /// Both fields must exist before any detection starts.
    pub fn validate(&self, point_schema: &FieldSchema, polygon_schema: &FieldSchema) -> Result<()> {
        if !point_schema.contains_key(&self.point_field) {
            return Err(QcError::configuration(format!(
                "point id field '{}' not found in point layer",
                self.point_field
            )));
        }
        if !polygon_schema.contains_key(&self.polygon_field) {
            return Err(QcError::configuration(format!(
                "polygon id field '{}' not found in polygon layer",
                self.polygon_field
            )));
        }
        Ok(())
    }
}

/// The four cadastral checks over one point dataset and one polygon dataset.
pub struct CadastralTopology<'a> {
    points: &'a IndexedLayer,
    polygons: &'a IndexedLayer,
    tolerance: f64,
    association: Association,
}

impl<'a> CadastralTopology<'a> {
    pub fn new(points: &'a IndexedLayer, polygons: &'a IndexedLayer, fields: &CadastralFields, tolerance: f64) -> Self {
        let association = Association::build(points, polygons, &fields.point_field, &fields.polygon_field);
        Self {
            points,
            polygons,
            tolerance,
            association,
        }
    }

    pub fn run(&self, control: &RunControl) -> Result<Vec<Finding>> {
        let mut findings = self.check_association();
        control.checkpoint()?;
        findings.extend(self.check_vertex_count());
        control.checkpoint()?;
        findings.extend(self.check_vertex_precision());
        control.checkpoint()?;
        findings.extend(self.check_shared_vertices(control)?);

        debug!(findings = findings.len(), "cadastral checks done");
        Ok(findings)
    }

    /// Check 1: orphan points, orphan polygons and ambiguous ids.
    pub fn check_association(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (slot, link) in self.association.links.iter().enumerate() {
            let finding = match link {
                PointLink::NoId | PointLink::Unique(_) => continue,
                PointLink::Unmatched => Finding::single(
                    AnomalyKind::OrphanPoint,
                    self.points.keys[slot].clone(),
                    Measure::Unmeasured,
                ),
                PointLink::Ambiguous(polygons) => Finding::single(
                    AnomalyKind::AmbiguousAssociation,
                    self.points.keys[slot].clone(),
                    Measure::count(polygons.len()),
                ),
            };
            match self.point(slot) {
                Some(point) => findings.push(finding.with_conflict(point)),
                None => findings.push(finding),
            }
        }

        for (slot, points) in self.association.polygon_points.iter().enumerate() {
            if self.association.polygon_has_id[slot] && points.is_empty() {
                let finding = Finding::single(
                    AnomalyKind::OrphanPolygon,
                    self.polygons.keys[slot].clone(),
                    Measure::Unmeasured,
                );
                match self.polygons.features[slot].geometry.as_polygon() {
                    Some(polygon) => findings.push(finding.with_conflict(polygon.clone())),
                    None => findings.push(finding),
                }
            }
        }

        findings
    }

    /// Check 2: marker count against exterior vertex count.
    pub fn check_vertex_count(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (slot, points) in self.association.polygon_points.iter().enumerate() {
            if !self.association.polygon_has_id[slot] {
                continue;
            }
            let Some(polygon) = self.polygons.features[slot].geometry.as_polygon() else {
                continue;
            };
            let vertices = exterior_vertices(polygon).len();
            if vertices != points.len() {
                findings.push(
                    Finding::single(
                        AnomalyKind::VertexCountMismatch,
                        self.polygons.keys[slot].clone(),
                        Measure::count(vertices.abs_diff(points.len())),
                    )
                    .with_conflict(polygon.clone()),
                );
            }
        }

        findings
    }

    /// Check 3: each associated marker lies on a vertex of its parcel.
    pub fn check_vertex_precision(&self) -> Vec<Finding> {
        let mut findings = Vec::new();

        for (slot, link) in self.association.links.iter().enumerate() {
            let PointLink::Unique(polygon_slot) = link else {
                continue;
            };
            let (Some(point), Some(polygon)) = (
                self.point(slot),
                self.polygons.features[*polygon_slot].geometry.as_polygon(),
            ) else {
                continue;
            };

            let nearest = exterior_vertices(polygon)
                .into_iter()
                .map(|v| (coord_distance(point.0, v), v))
                .min_by(|a, b| a.0.total_cmp(&b.0));
            if let Some((distance, vertex)) = nearest {
                if distance > self.tolerance {
                    findings.push(
                        Finding::pair(
                            AnomalyKind::PointVertexMismatch,
                            self.points.keys[slot].clone(),
                            self.polygons.keys[*polygon_slot].clone(),
                            Measure::distance(distance),
                        )
                        .with_conflict(Line::new(point.0, vertex)),
                    );
                }
            }
        }

        findings
    }

    /// Check 4: shared boundary stretches end on vertices of both parcels.
    pub fn check_shared_vertices(&self, control: &RunControl) -> Result<Vec<Finding>> {
        let mut findings = Vec::new();
        let polygons = self.polygons;

        for (i, feature) in polygons.features.iter().enumerate() {
            let Some(a) = feature.geometry.as_polygon() else {
                continue;
            };
            let vertices_a = exterior_vertices(a);

            for j in polygons.candidates(feature, self.tolerance) {
                control.checkpoint()?;
                if j <= i {
                    continue;
                }
                let Some(b) = polygons.features[j].geometry.as_polygon() else {
                    continue;
                };

                let pieces = shared_pieces(a.exterior(), b.exterior(), self.tolerance);
                if pieces.is_empty() {
                    continue;
                }
                let vertices_b = exterior_vertices(b);
                let ends = pieces.iter().flat_map(|p| [p.start, p.end]).collect();
                let missing: Vec<_> = dedup_coords(ends, self.tolerance)
                    .into_iter()
                    .filter(|c| {
                        !is_vertex_of(*c, &vertices_a, self.tolerance)
                            || !is_vertex_of(*c, &vertices_b, self.tolerance)
                    })
                    .collect();

                if !missing.is_empty() {
                    let conflict: MultiPoint<f64> = missing.iter().map(|c| Point::from(*c)).collect();
                    findings.push(
                        Finding::pair(
                            AnomalyKind::SharedVertexMissing,
                            polygons.keys[i].clone(),
                            polygons.keys[j].clone(),
                            Measure::count(missing.len()),
                        )
                        .with_conflict(conflict),
                    );
                }
            }
        }

        Ok(findings)
    }

    fn point(&self, slot: usize) -> Option<Point<f64>> {
        self.points.features[slot].geometry.as_point().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Crs, Feature, FeatureKey, FieldType, Geometry, LayerId};
    use approx::assert_relative_eq;

    fn fields() -> CadastralFields {
        CadastralFields::new("parcel", "num")
    }

    fn parcel(id: &str, num: &str, min: (f64, f64), max: (f64, f64)) -> Feature {
        Feature::new(id, Geometry::rect(min, max, Crs::default())).with_attribute("num", num)
    }

    fn marker(id: &str, num: &str, x: f64, y: f64) -> Feature {
        Feature::new(id, Geometry::point(x, y, Crs::default())).with_attribute("parcel", num)
    }

    fn layers(points: Vec<Feature>, polygons: Vec<Feature>) -> (IndexedLayer, IndexedLayer) {
        (
            IndexedLayer::build(LayerId::from("markers"), points),
            IndexedLayer::build(LayerId::from("parcels"), polygons),
        )
    }

    fn of_kind(findings: &[Finding], kind: AnomalyKind) -> Vec<&Finding> {
        findings.iter().filter(|f| f.kind == kind).collect()
    }

    #[test]
    fn test_missing_fields_rejected() {
        let mut points = FieldSchema::new();
        points.insert("parcel".to_string(), FieldType::Text);
        let polygons = FieldSchema::new();

        let err = fields().validate(&points, &polygons).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION");
    }

    #[test]
    fn test_consistent_parcel_is_clean() {
        let (points, polygons) = layers(
            vec![
                marker("1", "A", 0.0, 0.0),
                marker("2", "A", 10.0, 0.0),
                marker("3", "A", 10.0, 10.0),
                marker("4", "A", 0.0, 10.0),
            ],
            vec![parcel("p", "A", (0.0, 0.0), (10.0, 10.0))],
        );
        let findings = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE)
            .run(&RunControl::new())
            .unwrap();
        assert!(findings.is_empty(), "{findings:?}");
    }

    #[test]
    fn test_five_vertices_four_markers() {
        let pentagon = Feature::new(
            "p",
            Geometry::polygon(
                &[(0.0, 0.0), (10.0, 0.0), (12.0, 5.0), (10.0, 10.0), (0.0, 10.0)],
                Crs::default(),
            ),
        )
        .with_attribute("num", "A");
        let (points, polygons) = layers(
            vec![
                marker("1", "A", 0.0, 0.0),
                marker("2", "A", 10.0, 0.0),
                marker("3", "A", 10.0, 10.0),
                marker("4", "A", 0.0, 10.0),
            ],
            vec![pentagon],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        let findings = topology.check_vertex_count();

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].measure, Measure::count(1));
        assert_eq!(findings[0].primary, FeatureKey::new("parcels", "p"));
    }

    #[test]
    fn test_orphans_both_ways() {
        let (points, polygons) = layers(
            vec![marker("1", "Z", 50.0, 50.0)],
            vec![parcel("p", "A", (0.0, 0.0), (10.0, 10.0))],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        let findings = topology.check_association();

        assert_eq!(of_kind(&findings, AnomalyKind::OrphanPoint).len(), 1);
        assert_eq!(of_kind(&findings, AnomalyKind::OrphanPolygon).len(), 1);
    }

    #[test]
    fn test_ambiguous_id() {
        let (points, polygons) = layers(
            vec![marker("1", "A", 0.0, 0.0)],
            vec![
                parcel("p", "A", (0.0, 0.0), (10.0, 10.0)),
                parcel("q", "A", (20.0, 0.0), (30.0, 10.0)),
            ],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        let findings = topology.check_association();
        let ambiguous = of_kind(&findings, AnomalyKind::AmbiguousAssociation);
        assert_eq!(ambiguous.len(), 1);
        assert_eq!(ambiguous[0].measure, Measure::count(2));
    }

    #[test]
    fn test_marker_off_vertex() {
        let (points, polygons) = layers(
            vec![marker("1", "A", 0.0, 0.05)],
            vec![parcel("p", "A", (0.0, 0.0), (10.0, 10.0))],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        let findings = topology.check_vertex_precision();

        assert_eq!(findings.len(), 1);
        assert_relative_eq!(findings[0].measure.value(), 0.05, epsilon = 1e-12);
        assert_eq!(findings[0].primary.layer, LayerId::from("markers"));
    }

    #[test]
    fn test_shared_boundary_missing_vertex() {
        let (points, polygons) = layers(
            vec![],
            vec![
                parcel("p", "A", (0.0, 0.0), (10.0, 10.0)),
                parcel("q", "B", (10.0, 0.0), (20.0, 5.0)),
                parcel("r", "C", (10.0, 5.0), (20.0, 10.0)),
            ],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        let findings = topology.check_shared_vertices(&RunControl::new()).unwrap();

        // p's right edge has no vertex at (10, 5); q and r agree with each other.
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.measure == Measure::count(1)));
    }

    #[test]
    fn test_aligned_neighbours_are_clean() {
        let (points, polygons) = layers(
            vec![],
            vec![
                parcel("p", "A", (0.0, 0.0), (10.0, 10.0)),
                parcel("q", "B", (10.0, 0.0), (20.0, 10.0)),
            ],
        );
        let topology = CadastralTopology::new(&points, &polygons, &fields(), DEFAULT_COORDINATE_TOLERANCE);
        assert!(topology.check_shared_vertices(&RunControl::new()).unwrap().is_empty());
    }
}
