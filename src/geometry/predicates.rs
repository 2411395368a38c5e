//! Exact segment-level predicates shared by the detectors.
//!
//! Everything here works on plain `geo` coordinates and a linear tolerance.

use geo::line_intersection::{line_intersection, LineIntersection};
use geo::{Coord, EuclideanDistance, EuclideanLength, Line, LineString, Point, Polygon};

/// Distance between two coordinates.
pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    Point::from(a).euclidean_distance(&Point::from(b))
}

pub fn coords_close(a: Coord<f64>, b: Coord<f64>, tolerance: f64) -> bool {
    coord_distance(a, b) <= tolerance
}

/// Exterior ring vertices without the closing duplicate.
pub fn exterior_vertices(polygon: &Polygon<f64>) -> Vec<Coord<f64>> {
    ring_vertices(polygon.exterior())
}

pub fn ring_vertices(ring: &LineString<f64>) -> Vec<Coord<f64>> {
    let coords = &ring.0;
    if coords.len() > 1 && coords.first() == coords.last() {
        coords[..coords.len() - 1].to_vec()
    } else {
        coords.clone()
    }
}

pub fn is_vertex_of(point: Coord<f64>, vertices: &[Coord<f64>], tolerance: f64) -> bool {
    vertices.iter().any(|v| coords_close(point, *v, tolerance))
}

/// Shortest distance from a coordinate to a segment.
pub fn distance_to_segment(point: Coord<f64>, segment: Line<f64>) -> f64 {
    Point::from(point).euclidean_distance(&segment)
}

/// Shared stretch of two segments lying on the same line.
///
/// Returns the overlapping sub-segment when both segments are collinear within
/// `tolerance` and share more than `tolerance` of length.
pub fn collinear_overlap(a: Line<f64>, b: Line<f64>, tolerance: f64) -> Option<Line<f64>> {
    let length = a.euclidean_length();
    if length <= tolerance {
        return None;
    }
    if distance_to_infinite_line(b.start, a) > tolerance || distance_to_infinite_line(b.end, a) > tolerance {
        return None;
    }

    let dir = Coord {
        x: a.dx() / length,
        y: a.dy() / length,
    };
    let project = |c: Coord<f64>| (c.x - a.start.x) * dir.x + (c.y - a.start.y) * dir.y;

    let (b0, b1) = {
        let (s, e) = (project(b.start), project(b.end));
        if s <= e {
            (s, e)
        } else {
            (e, s)
        }
    };
    let from = b0.max(0.0);
    let to = b1.min(length);
    if to - from <= tolerance {
        return None;
    }

    let at = |t: f64| Coord {
        x: a.start.x + dir.x * t,
        y: a.start.y + dir.y * t,
    };
    Some(Line::new(at(from), at(to)))
}

fn distance_to_infinite_line(point: Coord<f64>, line: Line<f64>) -> f64 {
    let length = line.euclidean_length();
    if length == 0.0 {
        return coord_distance(point, line.start);
    }
    let cross = line.dx() * (point.y - line.start.y) - line.dy() * (point.x - line.start.x);
    cross.abs() / length
}

/// Collinear pieces shared by two linestrings, summed over all segment pairs.
pub fn shared_pieces(a: &LineString<f64>, b: &LineString<f64>, tolerance: f64) -> Vec<Line<f64>> {
    let mut pieces = Vec::new();
    for sa in a.lines() {
        for sb in b.lines() {
            if let Some(piece) = collinear_overlap(sa, sb, tolerance) {
                pieces.push(piece);
            }
        }
    }
    pieces
}

/// Single-point intersections between the segments of two linestrings.
///
/// Collinear contacts are left to [`shared_pieces`].
pub fn point_intersections(a: &LineString<f64>, b: &LineString<f64>) -> Vec<Coord<f64>> {
    let mut points = Vec::new();
    for sa in a.lines() {
        for sb in b.lines() {
            if let Some(LineIntersection::SinglePoint { intersection, .. }) = line_intersection(sa, sb) {
                points.push(intersection);
            }
        }
    }
    points
}

/// Points where a linestring crosses itself.
///
/// Adjacent segments always share a vertex and are skipped; for a closed ring
/// the first and last segments are adjacent too.
pub fn self_crossings(line: &LineString<f64>) -> Vec<Coord<f64>> {
    let segments: Vec<Line<f64>> = line.lines().collect();
    let closed = line.is_closed() && segments.len() > 2;
    let mut points = Vec::new();

    for i in 0..segments.len() {
        for j in (i + 2)..segments.len() {
            if closed && i == 0 && j == segments.len() - 1 {
                continue;
            }
            match line_intersection(segments[i], segments[j]) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => points.push(intersection),
                Some(LineIntersection::Collinear { intersection }) => points.push(intersection.start),
                None => {}
            }
        }
    }
    points
}

/// Removes near-duplicates, keeping first occurrences.
pub fn dedup_coords(coords: Vec<Coord<f64>>, tolerance: f64) -> Vec<Coord<f64>> {
    let mut unique: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if !unique.iter().any(|u| coords_close(*u, c, tolerance)) {
            unique.push(c);
        }
    }
    unique
}

/// Same vertex sequence in either direction, within tolerance.
pub fn same_vertices(a: &LineString<f64>, b: &LineString<f64>, tolerance: f64) -> bool {
    if a.0.len() != b.0.len() {
        return false;
    }
    let forward = a.coords().zip(b.coords()).all(|(p, q)| coords_close(*p, *q, tolerance));
    forward || a.coords().zip(b.coords().rev()).all(|(p, q)| coords_close(*p, *q, tolerance))
}
