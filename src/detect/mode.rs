//! Detection mode dispatch.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};
use crate::model::GeometryType;

/// Which detectors run, decided once from the input geometry types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    Points,
    Lines,
    Polygons,
    PointPolygon,
}

impl DetectionMode {
    pub fn resolve(types: &BTreeSet<GeometryType>) -> Result<Self> {
        use GeometryType::*;

        let listed: Vec<GeometryType> = types.iter().copied().collect();
        match listed.as_slice() {
            [Point] => Ok(DetectionMode::Points),
            [Line] => Ok(DetectionMode::Lines),
            [Polygon] => Ok(DetectionMode::Polygons),
            [Point, Polygon] => Ok(DetectionMode::PointPolygon),
            _ => Err(QcError::NotSupported { types: listed }),
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DetectionMode::Points => "points",
            DetectionMode::Lines => "lines",
            DetectionMode::Polygons => "polygons",
            DetectionMode::PointPolygon => "point+polygon",
        };
        f.write_str(name)
    }
}
