//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analysis::{run_analysis, AnalysisConfig, AnalysisReport, RunControl};
use crate::anomaly::{AnomalyRecord, Severity};
use crate::cadastral::CadastralFields;
use crate::classify::Profile;
use crate::correction::{
    CorrectionManager, CorrectionPlan, GeometryRepair, InMemoryStore, TrimOverlapRepair, ValidityRepair,
};
use crate::detect::ProximityPolicy;
use crate::error::{QcError, Result};
use crate::model::{Layer, LayerId};

/// On-disk dataset: a list of layers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetFile {
    pub layers: Vec<Layer>,
}

impl DatasetFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QcError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| QcError::FileWriteError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Options of the `analyze` command.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub dataset: PathBuf,
    pub config: Option<PathBuf>,
    pub profile: Option<String>,
    pub grouped: Option<String>,
    pub cadastral: Option<String>,
    pub layers: Vec<String>,
    pub json: bool,
    pub plan: Option<PathBuf>,
}

/// Configuration file (or defaults) with command-line overrides applied.
pub fn build_config(options: &AnalyzeOptions) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &options.config {
        Some(path) => AnalysisConfig::from_json_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => AnalysisConfig::default(),
    };

    if let Some(name) = &options.profile {
        config = config.with_profile_name(name.clone());
    }
    if let Some(field) = &options.grouped {
        config = config.with_policy(ProximityPolicy::Grouped { field: field.clone() });
    }
    if let Some(pair) = &options.cadastral {
        let Some((point_field, polygon_field)) = pair.split_once(':') else {
            bail!("--cadastral expects POINT_FIELD:POLYGON_FIELD, got '{}'", pair);
        };
        config = config.with_cadastral(CadastralFields::new(point_field.trim(), polygon_field.trim()));
    }

    config.validate()?;
    Ok(config)
}

/// Pick the layers to analyse, in the order they were requested.
pub fn select_layers(dataset: DatasetFile, wanted: &[String]) -> anyhow::Result<Vec<Arc<Layer>>> {
    if wanted.is_empty() {
        return Ok(dataset.layers.into_iter().map(Arc::new).collect());
    }
    let mut selected = Vec::with_capacity(wanted.len());
    for id in wanted {
        let layer = dataset
            .layers
            .iter()
            .find(|l| l.id.as_str() == id)
            .with_context(|| format!("layer '{}' not found in dataset", id))?;
        selected.push(Arc::new(layer.clone()));
    }
    Ok(selected)
}

/// Run an analysis and print the anomalies.
pub fn analyze(options: &AnalyzeOptions) -> anyhow::Result<()> {
    info!("Analysing dataset: {}", options.dataset.display());

    let config = build_config(options)?;
    let dataset = DatasetFile::load(&options.dataset)
        .with_context(|| format!("loading dataset {}", options.dataset.display()))?;
    let layers = select_layers(dataset, &options.layers)?;

    let report = run_analysis(&layers, &config, &RunControl::new())?;

    if let Some(path) = &options.plan {
        let plan = CorrectionPlan::from_records(&report);
        std::fs::write(path, serde_json::to_string_pretty(&plan)?)
            .with_context(|| format!("writing correction plan {}", path.display()))?;
        println!("Correction plan written: {} ({} features)", path.display(), plan.len());
    }

    if options.json {
        println!("{}", serde_json::to_string_pretty(report.records())?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!(
        "Mode: {}   Profile: {}   Anomalies: {}",
        report.mode,
        report.profile.name,
        report.len()
    );
    if report.degraded {
        println!("WARNING: layers could not be fused, only the first layer was analysed");
    }
    if report.repaired > 0 || report.excluded > 0 {
        println!(
            "Geometries repaired: {}   excluded: {}",
            report.repaired, report.excluded
        );
    }

    if !report.is_empty() {
        println!("{:-<100}", "");
        println!(
            "{:<10} {:<24} {:<28} {:<28} MEASURE",
            "SEVERITY", "KIND", "FEATURE", "OTHER"
        );
        println!("{:-<100}", "");
        for record in report {
            println!("{}", format_row(record));
        }
        println!("{:-<100}", "");

        let counts = report.severity_counts();
        let summary: Vec<String> = Severity::ALL
            .iter()
            .filter_map(|s| counts.get(s).map(|n| format!("{} {}", n, s)))
            .collect();
        println!("{}", summary.join(", "));
    }

    for warning in &report.warnings {
        warn!("{}", warning);
        if let Some(hint) = warning.recovery_suggestion() {
            println!("  note: {}", hint);
        }
    }
}

fn format_row(record: &AnomalyRecord) -> String {
    format!(
        "{:<10} {:<24} {:<28} {:<28} {}",
        record.severity(),
        record.kind(),
        record.primary(),
        record.secondary().map(|k| k.to_string()).unwrap_or_default(),
        record.measure()
    )
}

/// List the profile presets.
pub fn profiles() -> anyhow::Result<()> {
    println!(
        "{:<14} {:>12} {:>12}  AREA BANDS (low / moderate / high max)",
        "PROFILE", "POINTS", "LINE SNAP"
    );
    for profile in Profile::presets() {
        let bands = profile
            .area_bands
            .map(|b| format!("{} / {} / {}", b.low_max, b.moderate_max, b.high_max))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} {:>12} {:>12}  {}",
            profile.name, profile.point_threshold, profile.line_snap_distance, bands
        );
    }
    Ok(())
}

/// Repair collaborator by name.
pub fn repair_strategy(name: &str) -> anyhow::Result<Arc<dyn GeometryRepair>> {
    match name {
        "trim" => Ok(Arc::new(TrimOverlapRepair::default())),
        "validity" => Ok(Arc::new(ValidityRepair::default())),
        other => bail!("unknown repair strategy '{}', expected trim or validity", other),
    }
}

/// Apply a correction plan to a dataset file.
pub fn correct(dataset: &Path, plan: &Path, output: Option<&Path>, repair: &str) -> anyhow::Result<()> {
    info!("Correcting dataset: {}", dataset.display());

    let data = DatasetFile::load(dataset).with_context(|| format!("loading dataset {}", dataset.display()))?;
    let plan_text =
        std::fs::read_to_string(plan).with_context(|| format!("reading correction plan {}", plan.display()))?;
    let plan: CorrectionPlan = serde_json::from_str(&plan_text).context("parsing correction plan")?;

    let order: Vec<LayerId> = data.layers.iter().map(|l| l.id.clone()).collect();
    let store = Arc::new(InMemoryStore::with_layers(data.layers));
    let manager = CorrectionManager::new(store.clone(), repair_strategy(repair)?);

    let outcome = manager.apply(&plan)?;
    for layer in &outcome.layers {
        println!(
            "{} -> {}: {} deleted, {} repaired",
            layer.source, layer.derived, layer.deleted, layer.repaired
        );
    }
    println!("Transaction {} committed", outcome.transaction.id);

    if let Some(path) = output {
        let mut layers = Vec::new();
        for id in &order {
            if let Some(layer) = store.get(id) {
                layers.push((*layer).clone());
            }
            if let Some(corrected) = outcome.layers.iter().find(|l| &l.source == id) {
                if let Some(layer) = store.get(&corrected.derived) {
                    layers.push((*layer).clone());
                }
            }
        }
        DatasetFile { layers }
            .save(path)
            .with_context(|| format!("writing dataset {}", path.display()))?;
        println!("Dataset written: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Crs, Feature, Geometry, GeometryType};

    fn dataset() -> DatasetFile {
        let crs = Crs::new("EPSG:2154");
        DatasetFile {
            layers: vec![
                Layer::new("parcels", GeometryType::Polygon, crs.clone())
                    .with_feature(Feature::new("a", Geometry::rect((0.0, 0.0), (10.0, 10.0), crs.clone())))
                    .with_feature(Feature::new("b", Geometry::rect((5.0, 5.0), (15.0, 15.0), crs.clone()))),
                Layer::new("markers", GeometryType::Point, crs.clone())
                    .with_feature(Feature::new("1", Geometry::point(0.0, 0.0, crs))),
            ],
        }
    }

    #[test]
    fn test_dataset_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        dataset().save(&path).unwrap();

        let loaded = DatasetFile::load(&path).unwrap();
        assert_eq!(loaded.layers, dataset().layers);
    }

    #[test]
    fn test_build_config_overrides() {
        let options = AnalyzeOptions {
            profile: Some("hydro".to_string()),
            grouped: Some("basin".to_string()),
            cadastral: Some("parcel:num".to_string()),
            ..AnalyzeOptions::default()
        };
        let config = build_config(&options).unwrap();
        assert_eq!(config.effective_profile().unwrap().name, "Hydrology");
        assert_eq!(config.cadastral, Some(CadastralFields::new("parcel", "num")));
    }

    #[test]
    fn test_build_config_rejects_bad_cadastral() {
        let options = AnalyzeOptions {
            cadastral: Some("parcel".to_string()),
            ..AnalyzeOptions::default()
        };
        assert!(build_config(&options).is_err());
    }

    #[test]
    fn test_select_layers() {
        let selected = select_layers(dataset(), &["markers".to_string()]).unwrap();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].id, LayerId::from("markers"));
        assert!(select_layers(dataset(), &["roads".to_string()]).is_err());
    }

    #[test]
    fn test_correct_writes_derived_layer() {
        let dir = tempfile::tempdir().unwrap();
        let data_path = dir.path().join("data.json");
        let plan_path = dir.path().join("plan.json");
        let out_path = dir.path().join("out.json");
        dataset().save(&data_path).unwrap();
        std::fs::write(&plan_path, r#"{"parcels":{"b":"repair"}}"#).unwrap();

        correct(&data_path, &plan_path, Some(&out_path), "trim").unwrap();

        let out = DatasetFile::load(&out_path).unwrap();
        let ids: Vec<&str> = out.layers.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["parcels", "parcels_corrected", "markers"]);
    }
}
