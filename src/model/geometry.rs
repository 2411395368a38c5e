//! Typed geometries with a coordinate system tag and a validity flag.

use std::fmt;

use geo::{BoundingRect, Coord, LineString, Point, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// The three geometry families a layer can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeometryType {
    Point,
    Line,
    Polygon,
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryType::Point => write!(f, "point"),
            GeometryType::Line => write!(f, "line"),
            GeometryType::Polygon => write!(f, "polygon"),
        }
    }
}

/// Coordinate reference system identifier, e.g. `EPSG:2154`.
///
/// Only compared for equality: reprojection happens outside the core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Crs(String);

impl Crs {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Crs {
    fn default() -> Self {
        Self::new("EPSG:4326")
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of the last validation pass over a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validity {
    /// Never validated (as delivered by the layer provider).
    #[default]
    Unchecked,
    /// Validated, no change needed.
    Valid,
    /// Validated after a type-preserving repair.
    Repaired,
}

/// Concrete coordinates of a geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates", rename_all = "snake_case")]
pub enum Shape {
    Point(Point<f64>),
    Line(LineString<f64>),
    Polygon(Polygon<f64>),
}

/// A feature geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub shape: Shape,
    #[serde(default)]
    pub crs: Crs,
    #[serde(default)]
    pub validity: Validity,
}

impl Geometry {
    pub fn new(shape: Shape, crs: Crs) -> Self {
        Self {
            shape,
            crs,
            validity: Validity::Unchecked,
        }
    }

    pub fn point(x: f64, y: f64, crs: Crs) -> Self {
        Self::new(Shape::Point(Point::new(x, y)), crs)
    }

    pub fn line(coords: &[(f64, f64)], crs: Crs) -> Self {
        let line: LineString<f64> = coords.to_vec().into();
        Self::new(Shape::Line(line), crs)
    }

    /// Polygon from an exterior ring; the ring is closed if needed.
    pub fn polygon(exterior: &[(f64, f64)], crs: Crs) -> Self {
        let ring: LineString<f64> = exterior.to_vec().into();
        Self::new(Shape::Polygon(Polygon::new(ring, vec![])), crs)
    }

    /// Axis-aligned rectangle polygon, handy for parcels in tests and fixtures.
    pub fn rect(min: (f64, f64), max: (f64, f64), crs: Crs) -> Self {
        Self::polygon(
            &[
                (min.0, min.1),
                (max.0, min.1),
                (max.0, max.1),
                (min.0, max.1),
            ],
            crs,
        )
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self.shape {
            Shape::Point(_) => GeometryType::Point,
            Shape::Line(_) => GeometryType::Line,
            Shape::Polygon(_) => GeometryType::Polygon,
        }
    }

    pub fn with_validity(mut self, validity: Validity) -> Self {
        self.validity = validity;
        self
    }

    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        match &self.shape {
            Shape::Point(p) => Some(p.bounding_rect()),
            Shape::Line(l) => l.bounding_rect(),
            Shape::Polygon(p) => p.bounding_rect(),
        }
    }

    pub fn as_point(&self) -> Option<&Point<f64>> {
        match &self.shape {
            Shape::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_line(&self) -> Option<&LineString<f64>> {
        match &self.shape {
            Shape::Line(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&Polygon<f64>> {
        match &self.shape {
            Shape::Polygon(p) => Some(p),
            _ => None,
        }
    }

    /// All coordinates, exterior ring first for polygons.
    pub fn coords(&self) -> Vec<Coord<f64>> {
        match &self.shape {
            Shape::Point(p) => vec![p.0],
            Shape::Line(l) => l.0.clone(),
            Shape::Polygon(p) => p
                .exterior()
                .coords()
                .chain(p.interiors().iter().flat_map(|r| r.coords()))
                .copied()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_polygon_constructor_closes_ring() {
        let geom = Geometry::polygon(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)], Crs::default());
        let poly = geom.as_polygon().unwrap();
        assert!(poly.exterior().is_closed());
        assert_eq!(geom.geometry_type(), GeometryType::Polygon);
        assert_eq!(geom.validity, Validity::Unchecked);
    }

    #[test]
    fn test_bounding_rect() {
        let geom = Geometry::line(&[(2.0, 5.0), (-1.0, 3.0)], Crs::default());
        let rect = geom.bounding_rect().unwrap();
        assert_eq!(rect.min(), Coord { x: -1.0, y: 3.0 });
        assert_eq!(rect.max(), Coord { x: 2.0, y: 5.0 });
    }

    #[test]
    fn test_shape_json_layout() {
        let geom = Geometry::point(1.0, 2.0, Crs::new("EPSG:2154"));
        let json = serde_json::to_value(&geom).unwrap();
        assert_eq!(json["shape"]["type"], "point");
        assert_eq!(json["crs"], "EPSG:2154");

        let back: Geometry = serde_json::from_value(json).unwrap();
        assert_eq!(back, geom);
    }
}
