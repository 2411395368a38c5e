//! Polygon overlaps, within one source layer and across source layers.

use std::collections::BTreeMap;

use geo::{Area, BooleanOps, MultiPolygon, Polygon};

use crate::analysis::RunControl;
use crate::anomaly::{AnomalyKind, Finding, Measure};
use crate::error::Result;
use crate::index::IndexedLayer;
use crate::model::{Feature, LayerId};

/// Exact overlap of two polygons.
#[derive(Debug, Clone)]
pub struct Overlap {
    pub area: f64,
    pub ratio: f64,
    pub shape: MultiPolygon<f64>,
}

/// Intersection area and its ratio to the smaller polygon, `None` when the
/// polygons only touch or are disjoint.
pub fn overlap(a: &Polygon<f64>, b: &Polygon<f64>) -> Option<Overlap> {
    let shape = a.intersection(b);
    let area = shape.unsigned_area();
    if !(area > 0.0) {
        return None;
    }
    let smaller = a.unsigned_area().min(b.unsigned_area());
    if !(smaller > 0.0) {
        return None;
    }
    let area = area.min(smaller);
    Some(Overlap {
        area,
        ratio: (area / smaller).min(1.0),
        shape,
    })
}

pub fn detect_polygon_overlaps(
    layer: &IndexedLayer,
    min_overlap_area: f64,
    control: &RunControl,
) -> Result<Vec<Finding>> {
    let sources = split_by_source(layer);
    let mut findings = Vec::new();

    for source in sources.values() {
        self_overlaps(source, min_overlap_area, control, &mut findings)?;
    }

    let sources: Vec<&IndexedLayer> = sources.values().collect();
    for (n, left) in sources.iter().enumerate() {
        for right in &sources[n + 1..] {
            inter_overlaps(left, right, min_overlap_area, control, &mut findings)?;
        }
    }

    Ok(findings)
}

/// One index per origin layer; a single-source dataset yields itself.
fn split_by_source(layer: &IndexedLayer) -> BTreeMap<LayerId, IndexedLayer> {
    let mut grouped: BTreeMap<LayerId, Vec<Feature>> = BTreeMap::new();
    for (feature, key) in layer.features.iter().zip(&layer.keys) {
        grouped.entry(key.layer.clone()).or_default().push(feature.clone());
    }
    grouped
        .into_iter()
        .map(|(id, features)| (id.clone(), IndexedLayer::build(id, features)))
        .collect()
}

fn self_overlaps(
    layer: &IndexedLayer,
    min_overlap_area: f64,
    control: &RunControl,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let total = layer.len();
    for (i, feature) in layer.features.iter().enumerate() {
        let Some(a) = feature.geometry.as_polygon() else {
            continue;
        };
        for j in layer.candidates(feature, 0.0) {
            control.checkpoint()?;
            if j <= i {
                continue;
            }
            let Some(b) = layer.features[j].geometry.as_polygon() else {
                continue;
            };
            if let Some(found) = overlap(a, b).filter(|o| o.area >= min_overlap_area) {
                findings.push(to_finding(
                    AnomalyKind::PolygonOverlap,
                    layer,
                    i,
                    layer,
                    j,
                    found,
                ));
            }
        }
        control.progress("polygon overlaps", i + 1, total);
    }
    Ok(())
}

fn inter_overlaps(
    left: &IndexedLayer,
    right: &IndexedLayer,
    min_overlap_area: f64,
    control: &RunControl,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let total = left.len();
    for (i, feature) in left.features.iter().enumerate() {
        let Some(a) = feature.geometry.as_polygon() else {
            continue;
        };
        for j in right.candidates(feature, 0.0) {
            control.checkpoint()?;
            let Some(b) = right.features[j].geometry.as_polygon() else {
                continue;
            };
            if let Some(found) = overlap(a, b).filter(|o| o.area >= min_overlap_area) {
                findings.push(to_finding(
                    AnomalyKind::InterLayerOverlap,
                    left,
                    i,
                    right,
                    j,
                    found,
                ));
            }
        }
        control.progress("inter-layer overlaps", i + 1, total);
    }
    Ok(())
}

fn to_finding(
    kind: AnomalyKind,
    left: &IndexedLayer,
    i: usize,
    right: &IndexedLayer,
    j: usize,
    found: Overlap,
) -> Finding {
    Finding::pair(
        kind,
        left.keys[i].clone(),
        right.keys[j].clone(),
        Measure::Overlap {
            area: found.area,
            ratio: found.ratio,
        },
    )
    .with_conflict(found.shape)
}
