//! Analysis Orchestrator
//!
//! Wires normalization, fusion, indexing, detection and classification into
//! one run. Runs either on the caller's thread ([`run_analysis`]) or on a
//! dedicated worker publishing events ([`spawn_analysis`]).

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::anomaly::Finding;
use crate::cadastral::CadastralTopology;
use crate::classify::Profile;
use crate::detect::{
    detect_line_anomalies, detect_orphan_points, detect_point_proximity, detect_polygon_overlaps,
    DetectionMode, IdMatch,
};
use crate::error::{QcError, Result};
use crate::fusion::LayerFusion;
use crate::geometry::GeometryNormalizer;
use crate::index::IndexedLayer;
use crate::model::{GeometryType, Layer};

use super::config::AnalysisConfig;
use super::control::{AnalysisEvent, RunControl};
use super::report::AnalysisReport;

/// Datasets of one run, one per geometry type.
struct Prepared {
    datasets: BTreeMap<GeometryType, IndexedLayer>,
    warnings: Vec<QcError>,
    degraded: bool,
    repaired: usize,
    excluded: usize,
}

/// Run a full analysis on the current thread.
///
/// Configuration problems, unsupported layer combinations and cancellation
/// abort the run; invalid geometries and fusion mismatches only add warnings.
pub fn run_analysis(layers: &[Arc<Layer>], config: &AnalysisConfig, control: &RunControl) -> Result<AnalysisReport> {
    config.validate()?;
    let profile = config.effective_profile()?;

    if layers.is_empty() {
        return Err(QcError::configuration("no layer selected"));
    }
    let types: BTreeSet<GeometryType> = layers.iter().map(|l| l.geometry_type).collect();
    let mode = DetectionMode::resolve(&types)?;

    let mut groups: BTreeMap<GeometryType, Vec<Arc<Layer>>> = BTreeMap::new();
    for layer in layers {
        groups.entry(layer.geometry_type).or_default().push(Arc::clone(layer));
    }
    for (geometry_type, group) in &groups {
        if group.len() > config.fusion_limit {
            return Err(QcError::configuration(format!(
                "{} {} layers selected, at most {} can be analysed together",
                group.len(),
                geometry_type,
                config.fusion_limit
            )));
        }
    }
    if mode == DetectionMode::PointPolygon {
        if let Some(fields) = &config.cadastral {
            let polygon_layers = groups.get(&GeometryType::Polygon).map(Vec::as_slice).unwrap_or_default();
            for point_layer in groups.get(&GeometryType::Point).into_iter().flatten() {
                for polygon_layer in polygon_layers {
                    fields.validate(&point_layer.schema, &polygon_layer.schema)?;
                }
            }
        }
    }

    info!(%mode, layers = layers.len(), profile = %profile.name, "analysis started");
    control.emit(AnalysisEvent::Started {
        mode,
        layers: layers.len(),
    });

    let prepared = prepare(&groups, config, control)?;
    control.checkpoint()?;

    let findings = detect(mode, &prepared.datasets, config, &profile, control)?;
    control.checkpoint()?;

    let records = findings.into_iter().map(|f| f.classify(&profile)).collect();
    let mut report = AnalysisReport::new(mode, profile, records);
    report.warnings = prepared.warnings;
    report.degraded = prepared.degraded;
    report.repaired = prepared.repaired;
    report.excluded = prepared.excluded;

    info!(
        %mode,
        records = report.len(),
        warnings = report.warnings.len(),
        degraded = report.degraded,
        "analysis finished"
    );
    Ok(report)
}

fn prepare(
    groups: &BTreeMap<GeometryType, Vec<Arc<Layer>>>,
    config: &AnalysisConfig,
    control: &RunControl,
) -> Result<Prepared> {
    let fusion = LayerFusion::new(config.fusion_limit)?;
    let normalizer = GeometryNormalizer::default();
    let mut prepared = Prepared {
        datasets: BTreeMap::new(),
        warnings: Vec::new(),
        degraded: false,
        repaired: 0,
        excluded: 0,
    };

    for (geometry_type, group) in groups {
        control.checkpoint()?;
        let outcome = fusion.fuse_or_fallback(group)?;
        if let Some(err) = outcome.degraded {
            control.emit(AnalysisEvent::Warning {
                code: err.error_code(),
                message: err.to_string(),
            });
            prepared.degraded = true;
            prepared.warnings.push(err);
        }

        let dataset = outcome.dataset;
        let normalized = normalizer.normalize_features(&dataset.id, &dataset.crs, &dataset.features);
        if !normalized.excluded.is_empty() {
            warn!(
                layer = %dataset.id,
                excluded = normalized.excluded.len(),
                "invalid geometries left out of the analysis"
            );
        }
        for err in &normalized.excluded {
            control.emit(AnalysisEvent::Warning {
                code: err.error_code(),
                message: err.to_string(),
            });
        }
        prepared.repaired += normalized.repaired;
        prepared.excluded += normalized.excluded.len();
        prepared.warnings.extend(normalized.excluded);

        let indexed = IndexedLayer::build(dataset.id, normalized.features);
        debug!(
            layer = %indexed.id,
            %geometry_type,
            features = indexed.len(),
            "dataset indexed"
        );
        prepared.datasets.insert(*geometry_type, indexed);
    }

    Ok(prepared)
}

fn detect(
    mode: DetectionMode,
    datasets: &BTreeMap<GeometryType, IndexedLayer>,
    config: &AnalysisConfig,
    profile: &Profile,
    control: &RunControl,
) -> Result<Vec<Finding>> {
    let dataset = |geometry_type: GeometryType| {
        datasets
            .get(&geometry_type)
            .ok_or_else(|| QcError::configuration(format!("no {} layer selected", geometry_type)))
    };

    match mode {
        DetectionMode::Points => detect_point_proximity(
            dataset(GeometryType::Point)?,
            &config.proximity_policy,
            profile.point_threshold,
            control,
        ),
        DetectionMode::Lines => detect_line_anomalies(
            dataset(GeometryType::Line)?,
            config.coordinate_tolerance,
            profile.line_snap_distance,
            control,
        ),
        DetectionMode::Polygons => {
            detect_polygon_overlaps(dataset(GeometryType::Polygon)?, config.min_overlap_area, control)
        }
        DetectionMode::PointPolygon => {
            let points = dataset(GeometryType::Point)?;
            let polygons = dataset(GeometryType::Polygon)?;
            let id_match = config.cadastral.as_ref().map(|fields| IdMatch {
                point_field: &fields.point_field,
                polygon_field: &fields.polygon_field,
            });

            let mut findings = detect_orphan_points(points, polygons, id_match, control)?;
            if let Some(fields) = &config.cadastral {
                let topology = CadastralTopology::new(points, polygons, fields, config.coordinate_tolerance);
                findings.extend(topology.run(control)?);
            }
            Ok(findings)
        }
    }
}

/// A run on a background worker.
#[derive(Debug)]
pub struct AnalysisHandle {
    control: RunControl,
    events: UnboundedReceiver<AnalysisEvent>,
    worker: Option<JoinHandle<()>>,
}

/// Start an analysis on a dedicated thread.
///
/// The caller drains events from the returned handle; the last event is
/// always `Finished`, `Cancelled` or `Failed`.
pub fn spawn_analysis(layers: Vec<Arc<Layer>>, config: AnalysisConfig) -> Result<AnalysisHandle> {
    let (tx, rx) = mpsc::unbounded_channel();
    let control = RunControl::with_events(tx);
    let worker_control = control.clone();

    let worker = std::thread::Builder::new()
        .name("spatial-qc-analysis".to_string())
        .spawn(move || {
            let event = match run_analysis(&layers, &config, &worker_control) {
                Ok(report) => AnalysisEvent::Finished(report),
                Err(QcError::Cancelled) => {
                    info!("analysis cancelled");
                    AnalysisEvent::Cancelled
                }
                Err(err) => {
                    warn!(error = %err, "analysis failed");
                    AnalysisEvent::Failed(err)
                }
            };
            worker_control.emit(event);
        })
        .map_err(|e| QcError::Worker {
            reason: e.to_string(),
        })?;

    Ok(AnalysisHandle {
        control,
        events: rx,
        worker: Some(worker),
    })
}

impl AnalysisHandle {
    /// Request cooperative cancellation.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.control.token()
    }

    /// Next pending event, without blocking.
    pub fn try_next_event(&mut self) -> Option<AnalysisEvent> {
        self.events.try_recv().ok()
    }

    /// Block until the next event; `None` once the worker is gone.
    ///
    /// Must not be called from inside an async runtime.
    pub fn next_event_blocking(&mut self) -> Option<AnalysisEvent> {
        self.events.blocking_recv()
    }

    /// Async variant of [`next_event_blocking`](Self::next_event_blocking).
    pub async fn next_event(&mut self) -> Option<AnalysisEvent> {
        self.events.recv().await
    }

    /// Block until the run ends, discarding progress events.
    pub fn wait(mut self) -> Result<AnalysisReport> {
        let mut outcome = Err(QcError::Worker {
            reason: "worker stopped without a result".to_string(),
        });
        while let Some(event) = self.events.blocking_recv() {
            match event {
                AnalysisEvent::Finished(report) => {
                    outcome = Ok(report);
                    break;
                }
                AnalysisEvent::Cancelled => {
                    outcome = Err(QcError::Cancelled);
                    break;
                }
                AnalysisEvent::Failed(err) => {
                    outcome = Err(err);
                    break;
                }
                _ => {}
            }
        }

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                return Err(QcError::Worker {
                    reason: "analysis worker panicked".to_string(),
                });
            }
        }
        outcome
    }
}
