//! Spatial QC - quality control for vector datasets
//!
//! Spatial QC finds geometric and topological anomalies in point, line and
//! polygon layers, grades them by severity for a domain profile, and applies
//! corrections transactionally.
//!
//! # Architecture
//!
//! An analysis run goes through a fixed pipeline:
//! - Fusion: up to four same-type layers become one dataset, each feature
//!   keeping its source layer
//! - Normalization: invalid geometries are repaired or excluded
//! - Indexing: an R-tree per dataset feeds candidate pairs to the detectors
//! - Detection: a detector family picked from the layers' geometry types
//! - Classification: every finding gets a severity from the active profile
//!
//! Corrections never touch a source layer: the [`CorrectionManager`] writes a
//! derived layer per corrected source and restores the store from a backup
//! snapshot if anything fails.

pub mod analysis;
pub mod anomaly;
pub mod cadastral;
pub mod classify;
pub mod cli;
pub mod correction;
pub mod detect;
pub mod error;
pub mod fusion;
pub mod geometry;
pub mod index;
pub mod logging;
pub mod model;

pub use analysis::{run_analysis, spawn_analysis, AnalysisConfig, AnalysisEvent, AnalysisHandle, AnalysisReport, RunControl};
pub use anomaly::{AnomalyKind, AnomalyRecord, Finding, Measure, Severity};
pub use cadastral::{CadastralFields, CadastralTopology};
pub use classify::{classify, Profile};
pub use correction::{CorrectionManager, CorrectionPlan, DatasetStore, GeometryRepair, InMemoryStore};
pub use detect::{DetectionMode, ProximityPolicy};
pub use error::{QcError, Result};
pub use fusion::{FusedDataset, LayerFusion};
pub use geometry::GeometryNormalizer;
pub use index::SpatialIndex;
pub use model::{Crs, Feature, FeatureId, FeatureKey, Geometry, GeometryType, Layer, LayerId};
