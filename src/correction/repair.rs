//! Geometry repair collaborators used by `Repair` actions.

use geo::{Area, BooleanOps, Intersects, MultiPolygon};

use crate::error::{QcError, Result};
use crate::geometry::GeometryNormalizer;
use crate::model::{Feature, Geometry, Layer, Shape, Validity};

/// Produces a corrected geometry for one feature of a layer.
pub trait GeometryRepair: Send + Sync {
    fn name(&self) -> &'static str;

    /// `layer` is the working copy the feature belongs to.
    fn repair(&self, feature: &Feature, layer: &Layer) -> Result<Geometry>;
}

/// Applies the normalizer's type-preserving repair.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidityRepair {
    normalizer: GeometryNormalizer,
}

impl GeometryRepair for ValidityRepair {
    fn name(&self) -> &'static str {
        "validity"
    }

    fn repair(&self, feature: &Feature, _layer: &Layer) -> Result<Geometry> {
        self.normalizer
            .normalize(&feature.geometry)
            .map_err(|reason| QcError::RepairFailed {
                feature: feature.id.clone(),
                reason: reason.to_string(),
            })
    }
}

/// Cuts away the parts of a polygon that overlap other polygons of its layer.
///
/// The result must stay a single polygon with a positive area.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrimOverlapRepair {
    normalizer: GeometryNormalizer,
}

impl GeometryRepair for TrimOverlapRepair {
    fn name(&self) -> &'static str {
        "trim-overlap"
    }

    fn repair(&self, feature: &Feature, layer: &Layer) -> Result<Geometry> {
        let failed = |reason: &str| QcError::RepairFailed {
            feature: feature.id.clone(),
            reason: reason.to_string(),
        };
        let Some(target) = feature.geometry.as_polygon() else {
            return Err(failed("only polygons can be trimmed"));
        };

        let mut remaining = MultiPolygon::new(vec![target.clone()]);
        for other in &layer.features {
            if other.id == feature.id {
                continue;
            }
            let Some(neighbour) = other.geometry.as_polygon() else {
                continue;
            };
            if !neighbour.intersects(target) {
                continue;
            }
            remaining = remaining.difference(&MultiPolygon::new(vec![neighbour.clone()]));
        }

        let mut parts: Vec<_> = remaining.0.into_iter().filter(|p| p.unsigned_area() > 0.0).collect();
        let polygon = match parts.len() {
            0 => return Err(failed("polygon is entirely covered by its neighbours")),
            1 => parts.remove(0),
            n => return Err(failed(&format!("trimming splits the polygon into {} parts", n))),
        };

        let trimmed = Geometry::new(Shape::Polygon(polygon), feature.geometry.crs.clone());
        let repaired = self
            .normalizer
            .normalize(&trimmed)
            .map_err(|reason| failed(&reason.to_string()))?
            .with_validity(Validity::Repaired);
        Ok(repaired)
    }
}
