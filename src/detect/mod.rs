//! Overlap Detector
//!
//! Mode-dispatched anomaly detection over indexed datasets. Every detector
//! compares each unordered pair of features at most once, never compares a
//! feature with itself, and checks for cancellation between candidate pairs.
//!
//! Detectors return unclassified [`Finding`](crate::anomaly::Finding)s; the
//! orchestrator classifies them under the run's profile.

mod containment;
mod lines;
mod mode;
mod points;
mod polygons;

pub use containment::{detect_orphan_points, IdMatch};
pub use lines::detect_line_anomalies;
pub use mode::DetectionMode;
pub use points::{detect_point_proximity, ProximityPolicy};
pub use polygons::{detect_polygon_overlaps, overlap, Overlap};
