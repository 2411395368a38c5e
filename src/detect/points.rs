//! Point proximity.

use geo::Line;
use serde::{Deserialize, Serialize};

use crate::analysis::RunControl;
use crate::anomaly::{AnomalyKind, Finding, Measure};
use crate::error::Result;
use crate::geometry::predicates::coord_distance;
use crate::index::IndexedLayer;

/// Which point pairs are compared.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ProximityPolicy {
    /// Every pair of nearby points.
    #[default]
    Strict,
    /// Only pairs sharing the same value of `field`; null values never match.
    Grouped { field: String },
}

/// Report point pairs no farther apart than `threshold`, coincident ones included.
pub fn detect_point_proximity(
    layer: &IndexedLayer,
    policy: &ProximityPolicy,
    threshold: f64,
    control: &RunControl,
) -> Result<Vec<Finding>> {
    let groups: Option<Vec<Option<String>>> = match policy {
        ProximityPolicy::Strict => None,
        ProximityPolicy::Grouped { field } => Some(
            layer
                .features
                .iter()
                .map(|f| f.attribute_key(field))
                .collect(),
        ),
    };

    let mut findings = Vec::new();
    let total = layer.len();

    for (i, feature) in layer.features.iter().enumerate() {
        let Some(point) = feature.geometry.as_point() else {
            continue;
        };
        let group = match &groups {
            Some(groups) => match &groups[i] {
                Some(g) => Some(g),
                None => continue,
            },
            None => None,
        };

        for j in layer.index.query_around(point.0, threshold) {
            control.checkpoint()?;
            if j <= i {
                continue;
            }
            if let Some(groups) = &groups {
                if groups[j].as_ref() != group {
                    continue;
                }
            }
            let Some(other) = layer.features[j].geometry.as_point() else {
                continue;
            };

            let distance = coord_distance(point.0, other.0);
            if distance <= threshold {
                findings.push(
                    Finding::pair(
                        AnomalyKind::PointProximity,
                        layer.keys[i].clone(),
                        layer.keys[j].clone(),
                        Measure::distance(distance),
                    )
                    .with_conflict(Line::new(point.0, other.0)),
                );
            }
        }
        control.progress("point proximity", i + 1, total);
    }

    Ok(findings)
}
