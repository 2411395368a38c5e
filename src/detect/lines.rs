//! Line network checks: duplicates, shared stretches, unnoded crossings,
//! self-intersections and dangling endpoints.

use geo::{Coord, EuclideanLength, LineString, MultiLineString, MultiPoint, Point};

use crate::analysis::RunControl;
use crate::anomaly::{AnomalyKind, Finding, Measure};
use crate::error::Result;
use crate::geometry::predicates::{
    coords_close, dedup_coords, distance_to_segment, is_vertex_of, point_intersections, same_vertices,
    self_crossings, shared_pieces,
};
use crate::index::IndexedLayer;

pub fn detect_line_anomalies(
    layer: &IndexedLayer,
    tolerance: f64,
    snap_distance: f64,
    control: &RunControl,
) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();
    let total = layer.len();

    for (i, feature) in layer.features.iter().enumerate() {
        let Some(line) = feature.geometry.as_line() else {
            continue;
        };

        for j in layer.candidates(feature, tolerance) {
            control.checkpoint()?;
            if j <= i {
                continue;
            }
            let Some(other) = layer.features[j].geometry.as_line() else {
                continue;
            };
            compare_pair(layer, i, j, line, other, tolerance, &mut findings);
        }

        let crossings = dedup_coords(self_crossings(line), tolerance);
        if !crossings.is_empty() {
            findings.push(
                Finding::single(
                    AnomalyKind::LineSelfIntersection,
                    layer.keys[i].clone(),
                    Measure::count(crossings.len()),
                )
                .with_conflict(to_multipoint(&crossings)),
            );
        }

        if let Some(finding) = dangling_endpoints(layer, i, line, tolerance, snap_distance) {
            findings.push(finding);
        }

        control.progress("line topology", i + 1, total);
    }

    Ok(findings)
}

fn compare_pair(
    layer: &IndexedLayer,
    i: usize,
    j: usize,
    a: &LineString<f64>,
    b: &LineString<f64>,
    tolerance: f64,
    findings: &mut Vec<Finding>,
) {
    let key_a = || layer.keys[i].clone();
    let key_b = || layer.keys[j].clone();

    if same_vertices(a, b, tolerance) {
        let length = a.euclidean_length();
        findings.push(
            Finding::pair(
                AnomalyKind::LineDuplicate,
                key_a(),
                key_b(),
                Measure::SharedLength { length, ratio: 1.0 },
            )
            .with_conflict(a.clone()),
        );
        return;
    }

    let pieces = shared_pieces(a, b, tolerance);
    let shared: f64 = pieces.iter().map(|p| p.euclidean_length()).sum();
    if shared > tolerance {
        let shorter = a.euclidean_length().min(b.euclidean_length());
        let ratio = if shorter > 0.0 {
            (shared / shorter).min(1.0)
        } else {
            1.0
        };
        let conflict: MultiLineString<f64> = pieces
            .iter()
            .map(|p| LineString::new(vec![p.start, p.end]))
            .collect();
        findings.push(
            Finding::pair(
                AnomalyKind::LineOverlap,
                key_a(),
                key_b(),
                Measure::SharedLength {
                    length: shared,
                    ratio,
                },
            )
            .with_conflict(conflict),
        );
    }

    let ends_a = endpoints(a);
    let ends_b = endpoints(b);
    let crossings: Vec<Coord<f64>> = point_intersections(a, b)
        .into_iter()
        .filter(|c| !(is_vertex_of(*c, &ends_a, tolerance) && is_vertex_of(*c, &ends_b, tolerance)))
        .filter(|c| !(is_vertex_of(*c, &a.0, tolerance) && is_vertex_of(*c, &b.0, tolerance)))
        .filter(|c| !pieces.iter().any(|p| distance_to_segment(*c, *p) <= tolerance))
        .collect();
    let crossings = dedup_coords(crossings, tolerance);

    if !crossings.is_empty() {
        findings.push(
            Finding::pair(
                AnomalyKind::CrossingWithoutNode,
                key_a(),
                key_b(),
                Measure::count(crossings.len()),
            )
            .with_conflict(to_multipoint(&crossings)),
        );
    }
}

/// One record per line, measured by its smallest endpoint gap.
fn dangling_endpoints(
    layer: &IndexedLayer,
    slot: usize,
    line: &LineString<f64>,
    tolerance: f64,
    snap_distance: f64,
) -> Option<Finding> {
    if line.is_closed() {
        return None;
    }

    let search = snap_distance.max(tolerance);
    let mut dangling = Vec::new();
    let mut smallest_gap = snap_distance;

    for end in endpoints(line) {
        let neighbours: Vec<&LineString<f64>> = layer
            .index
            .query_around(end, search)
            .into_iter()
            .filter(|&k| k != slot)
            .filter_map(|k| layer.features[k].geometry.as_line())
            .collect();

        let connected = neighbours
            .iter()
            .any(|other| endpoints(other).iter().any(|e| coords_close(*e, end, tolerance)));
        if connected {
            continue;
        }

        let gap = neighbours
            .iter()
            .flat_map(|other| other.lines())
            .map(|segment| distance_to_segment(end, segment))
            .fold(snap_distance, f64::min);
        smallest_gap = smallest_gap.min(gap);
        dangling.push(end);
    }

    if dangling.is_empty() {
        return None;
    }
    Some(
        Finding::single(
            AnomalyKind::DanglingEndpoint,
            layer.keys[slot].clone(),
            Measure::gap(smallest_gap),
        )
        .with_conflict(to_multipoint(&dangling)),
    )
}

fn endpoints(line: &LineString<f64>) -> Vec<Coord<f64>> {
    match (line.0.first(), line.0.last()) {
        (Some(first), Some(last)) => vec![*first, *last],
        _ => Vec::new(),
    }
}

fn to_multipoint(coords: &[Coord<f64>]) -> MultiPoint<f64> {
    coords.iter().map(|c| Point::from(*c)).collect()
}
