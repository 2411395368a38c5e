//! Analysis configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cadastral::{CadastralFields, DEFAULT_COORDINATE_TOLERANCE};
use crate::classify::Profile;
use crate::detect::ProximityPolicy;
use crate::error::{QcError, Result};
use crate::fusion::MAX_FUSED_LAYERS;

/// A preset picked by name, or a full custom profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileChoice {
    Named(String),
    Custom(Profile),
}

impl Default for ProfileChoice {
    fn default() -> Self {
        ProfileChoice::Named("cadastre".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub profile: ProfileChoice,
    pub proximity_policy: ProximityPolicy,
    /// Overrides the profile's point threshold.
    pub proximity_threshold: Option<f64>,
    /// Polygon overlaps smaller than this are ignored.
    pub min_overlap_area: f64,
    /// Vertex coincidence tolerance for lines and cadastral checks.
    pub coordinate_tolerance: f64,
    /// Overrides the profile's line snap distance.
    pub line_snap_distance: Option<f64>,
    pub cadastral: Option<CadastralFields>,
    pub fusion_limit: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            profile: ProfileChoice::default(),
            proximity_policy: ProximityPolicy::Strict,
            proximity_threshold: None,
            min_overlap_area: 1e-6,
            coordinate_tolerance: DEFAULT_COORDINATE_TOLERANCE,
            line_snap_distance: None,
            cadastral: None,
            fusion_limit: MAX_FUSED_LAYERS,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| QcError::FileReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: AnalysisConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = ProfileChoice::Custom(profile);
        self
    }

    pub fn with_profile_name(mut self, name: impl Into<String>) -> Self {
        self.profile = ProfileChoice::Named(name.into());
        self
    }

    pub fn with_policy(mut self, policy: ProximityPolicy) -> Self {
        self.proximity_policy = policy;
        self
    }

    pub fn with_cadastral(mut self, fields: CadastralFields) -> Self {
        self.cadastral = Some(fields);
        self
    }

    /// The profile with this configuration's overrides applied.
    pub fn effective_profile(&self) -> Result<Profile> {
        let mut profile = match &self.profile {
            ProfileChoice::Named(name) => Profile::by_name(name)
                .ok_or_else(|| QcError::configuration(format!("unknown profile '{}'", name)))?,
            ProfileChoice::Custom(profile) => profile.clone(),
        };
        if let Some(threshold) = self.proximity_threshold {
            profile = profile.with_point_threshold(threshold);
        }
        if let Some(distance) = self.line_snap_distance {
            profile = profile.with_line_snap_distance(distance);
        }
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<()> {
        self.effective_profile()?;

        if !self.min_overlap_area.is_finite() || self.min_overlap_area < 0.0 {
            return Err(QcError::configuration(format!(
                "min overlap area must be zero or positive, got {}",
                self.min_overlap_area
            )));
        }
        if !(self.coordinate_tolerance > 0.0) || !self.coordinate_tolerance.is_finite() {
            return Err(QcError::configuration(format!(
                "coordinate tolerance must be positive, got {}",
                self.coordinate_tolerance
            )));
        }
        if self.fusion_limit == 0 || self.fusion_limit > MAX_FUSED_LAYERS {
            return Err(QcError::configuration(format!(
                "fusion limit must be between 1 and {}, got {}",
                MAX_FUSED_LAYERS, self.fusion_limit
            )));
        }
        if let ProximityPolicy::Grouped { field } = &self.proximity_policy {
            if field.trim().is_empty() {
                return Err(QcError::configuration("grouped proximity needs a field name"));
            }
        }
        if let Some(fields) = &self.cadastral {
            if fields.point_field.trim().is_empty() || fields.polygon_field.trim().is_empty() {
                return Err(QcError::configuration("cadastral id fields cannot be empty"));
            }
        }
        Ok(())
    }
}
