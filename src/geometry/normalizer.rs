//! Geometry Normalizer
//!
//! Validates feature geometries before indexing and applies deterministic,
//! type-preserving repairs. Features that cannot be repaired are excluded from
//! the run and reported as soft `GeometryInvalid` warnings.

use geo::{Area, Coord, LineString, Polygon};
use tracing::debug;

use super::predicates::{coords_close, self_crossings};
use crate::error::QcError;
use crate::model::{Crs, Feature, Geometry, LayerId, Shape, Validity};

/// Why a geometry could not be repaired.
#[derive(Debug, Clone, PartialEq)]
pub enum InvalidReason {
    NonFiniteCoordinate,
    TooFewVertices { found: usize, required: usize },
    ZeroArea,
    SelfIntersection { crossings: usize },
    CrsMismatch { expected: Crs, found: Crs },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::NonFiniteCoordinate => write!(f, "non-finite coordinate"),
            InvalidReason::TooFewVertices { found, required } => {
                write!(f, "{} distinct vertices, at least {} required", found, required)
            }
            InvalidReason::ZeroArea => write!(f, "polygon has zero area"),
            InvalidReason::SelfIntersection { crossings } => {
                write!(f, "exterior ring crosses itself {} time(s)", crossings)
            }
            InvalidReason::CrsMismatch { expected, found } => {
                write!(f, "coordinate system {} differs from layer {}", found, expected)
            }
        }
    }
}

/// Features that survived normalization, plus what was dropped.
#[derive(Debug, Default)]
pub struct NormalizedFeatures {
    pub features: Vec<Feature>,
    pub excluded: Vec<QcError>,
    pub repaired: usize,
}

/// Validates and repairs geometries.
#[derive(Debug, Clone, Copy)]
pub struct GeometryNormalizer {
    /// Vertices closer than this are considered duplicates.
    tolerance: f64,
}

impl Default for GeometryNormalizer {
    fn default() -> Self {
        Self::new(1e-9)
    }
}

impl GeometryNormalizer {
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Validate one geometry, repairing it if possible.
    ///
    /// The returned geometry is flagged `Valid` when untouched and `Repaired`
    /// otherwise; its type never changes.
    pub fn normalize(&self, geometry: &Geometry) -> Result<Geometry, InvalidReason> {
        if geometry.coords().iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
            return Err(InvalidReason::NonFiniteCoordinate);
        }

        let (shape, changed) = match &geometry.shape {
            Shape::Point(p) => (Shape::Point(*p), false),
            Shape::Line(line) => {
                let cleaned = self.dedup_consecutive(&line.0);
                let distinct = cleaned.len();
                if distinct < 2 {
                    return Err(InvalidReason::TooFewVertices {
                        found: distinct,
                        required: 2,
                    });
                }
                let changed = cleaned.len() != line.0.len();
                (Shape::Line(LineString::new(cleaned)), changed)
            }
            Shape::Polygon(polygon) => {
                let (repaired, changed) = self.repair_polygon(polygon)?;
                (Shape::Polygon(repaired), changed)
            }
        };

        let validity = if changed {
            Validity::Repaired
        } else {
            Validity::Valid
        };
        Ok(Geometry {
            shape,
            crs: geometry.crs.clone(),
            validity,
        })
    }

    /// Normalize every feature of a dataset, dropping the irreparable ones.
    pub fn normalize_features<'a>(
        &self,
        layer: &LayerId,
        crs: &Crs,
        features: impl IntoIterator<Item = &'a Feature>,
    ) -> NormalizedFeatures {
        let mut out = NormalizedFeatures::default();

        for feature in features {
            let result = if &feature.geometry.crs != crs {
                Err(InvalidReason::CrsMismatch {
                    expected: crs.clone(),
                    found: feature.geometry.crs.clone(),
                })
            } else {
                self.normalize(&feature.geometry)
            };

            match result {
                Ok(geometry) => {
                    if geometry.validity == Validity::Repaired {
                        debug!(layer = %layer, feature = %feature.id, "geometry repaired");
                        out.repaired += 1;
                    }
                    let mut normalized = feature.clone();
                    normalized.geometry = geometry;
                    out.features.push(normalized);
                }
                Err(reason) => {
                    let key = feature.key(layer);
                    out.excluded.push(QcError::GeometryInvalid {
                        layer: key.layer,
                        feature: key.feature,
                        reason: reason.to_string(),
                    });
                }
            }
        }

        out
    }

    fn repair_polygon(&self, polygon: &Polygon<f64>) -> Result<(Polygon<f64>, bool), InvalidReason> {
        let (exterior, mut changed) = self.clean_ring(polygon.exterior());
        let distinct = exterior.0.len().saturating_sub(1);
        if distinct < 3 {
            return Err(InvalidReason::TooFewVertices {
                found: distinct,
                required: 3,
            });
        }

        let crossings = self_crossings(&exterior).len();
        if crossings > 0 {
            return Err(InvalidReason::SelfIntersection { crossings });
        }

        let mut interiors = Vec::with_capacity(polygon.interiors().len());
        for ring in polygon.interiors() {
            let (cleaned, ring_changed) = self.clean_ring(ring);
            changed |= ring_changed;
            if cleaned.0.len() >= 4 {
                interiors.push(cleaned);
            } else {
                changed = true;
            }
        }

        let repaired = Polygon::new(exterior, interiors);
        if repaired.unsigned_area() <= 0.0 {
            return Err(InvalidReason::ZeroArea);
        }
        Ok((repaired, changed))
    }

    /// Drops consecutive duplicates and closes the ring.
    fn clean_ring(&self, ring: &LineString<f64>) -> (LineString<f64>, bool) {
        let mut coords = self.dedup_consecutive(&ring.0);
        while coords.len() > 1 && coords_close(coords[0], coords[coords.len() - 1], self.tolerance) {
            coords.pop();
        }
        if let Some(first) = coords.first().copied() {
            coords.push(first);
        }
        let changed = coords != ring.0;
        (LineString::new(coords), changed)
    }

    fn dedup_consecutive(&self, coords: &[Coord<f64>]) -> Vec<Coord<f64>> {
        let mut out: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
        for c in coords {
            match out.last() {
                Some(last) if coords_close(*last, *c, self.tolerance) => {}
                _ => out.push(*c),
            }
        }
        out
    }
}
