//! Quality control profiles.
//!
//! A profile is an immutable bundle of thresholds for one trade. It is passed
//! explicitly into detection and classification.

use serde::{Deserialize, Serialize};

use crate::error::{QcError, Result};

/// Fractions splitting a measure into Critical / High / Moderate tiers.
///
/// For proximity-like measures a smaller fraction is more severe; for
/// overlap ratios a larger one is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bands {
    pub critical: f64,
    pub high: f64,
    pub moderate: f64,
}

impl Bands {
    pub const PROXIMITY: Bands = Bands {
        critical: 0.10,
        high: 0.30,
        moderate: 0.60,
    };

    pub const OVERLAP: Bands = Bands {
        critical: 0.50,
        high: 0.20,
        moderate: 0.05,
    };
}

/// Absolute overlap area tiers, in squared map units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AreaBands {
    /// Areas up to this are Low.
    pub low_max: f64,
    /// Areas up to this are Moderate.
    pub moderate_max: f64,
    /// Areas up to this are High; anything larger is Critical.
    pub high_max: f64,
}

/// Named threshold bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    /// Maximum distance at which two points are reported as too close.
    pub point_threshold: f64,
    /// Distance under which a line endpoint counts as a near-miss dangle.
    pub line_snap_distance: f64,
    #[serde(default = "default_proximity_bands")]
    pub proximity_bands: Bands,
    #[serde(default = "default_overlap_bands")]
    pub overlap_bands: Bands,
    #[serde(default)]
    pub area_bands: Option<AreaBands>,
}

fn default_proximity_bands() -> Bands {
    Bands::PROXIMITY
}

fn default_overlap_bands() -> Bands {
    Bands::OVERLAP
}

impl Default for Profile {
    fn default() -> Self {
        Self::cadastre()
    }
}

impl Profile {
    /// Land registry work, ±2 m.
    pub fn cadastre() -> Self {
        Self::preset("Cadastre", 2.0, 0.5, (5.0, 100.0, 500.0))
    }

    /// Building and public works (BTP), ±5 cm.
    pub fn construction() -> Self {
        Self::preset("Construction", 0.05, 0.05, (0.5, 10.0, 50.0))
    }

    /// Survey-grade topography, ±1 cm.
    pub fn topography() -> Self {
        Self::preset("Topography", 0.01, 0.01, (1.0, 50.0, 200.0))
    }

    /// Hydrographic networks, ±10 m.
    pub fn hydrology() -> Self {
        Self::preset("Hydrology", 10.0, 2.0, (100.0, 1000.0, 5000.0))
    }

    /// A custom profile with the default bands and no area tiers.
    pub fn custom(name: impl Into<String>, point_threshold: f64, line_snap_distance: f64) -> Self {
        Self {
            name: name.into(),
            point_threshold,
            line_snap_distance,
            proximity_bands: Bands::PROXIMITY,
            overlap_bands: Bands::OVERLAP,
            area_bands: None,
        }
    }

    fn preset(name: &str, point_threshold: f64, line_snap_distance: f64, area: (f64, f64, f64)) -> Self {
        Self {
            area_bands: Some(AreaBands {
                low_max: area.0,
                moderate_max: area.1,
                high_max: area.2,
            }),
            ..Self::custom(name, point_threshold, line_snap_distance)
        }
    }

    pub fn presets() -> Vec<Profile> {
        vec![
            Self::cadastre(),
            Self::construction(),
            Self::topography(),
            Self::hydrology(),
        ]
    }

    /// Look up a preset by name, case-insensitively; a unique prefix is enough.
    ///
    /// "btp" is accepted for the construction profile.
    pub fn by_name(name: &str) -> Option<Profile> {
        let wanted = name.trim().to_lowercase();
        if wanted.is_empty() {
            return None;
        }
        if wanted == "btp" {
            return Some(Self::construction());
        }
        let mut matches = Self::presets()
            .into_iter()
            .filter(|p| p.name.to_lowercase().starts_with(&wanted));
        let first = matches.next()?;
        match matches.next() {
            Some(_) => None,
            None => Some(first),
        }
    }

    pub fn with_point_threshold(mut self, threshold: f64) -> Self {
        self.point_threshold = threshold;
        self
    }

    pub fn with_line_snap_distance(mut self, distance: f64) -> Self {
        self.line_snap_distance = distance;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.point_threshold > 0.0) || !self.point_threshold.is_finite() {
            return Err(QcError::configuration(format!(
                "profile {}: point threshold must be positive, got {}",
                self.name, self.point_threshold
            )));
        }
        if !(self.line_snap_distance > 0.0) || !self.line_snap_distance.is_finite() {
            return Err(QcError::configuration(format!(
                "profile {}: line snap distance must be positive, got {}",
                self.name, self.line_snap_distance
            )));
        }
        let p = self.proximity_bands;
        if !(0.0 < p.critical && p.critical <= p.high && p.high <= p.moderate) {
            return Err(QcError::configuration(format!(
                "profile {}: proximity bands must increase",
                self.name
            )));
        }
        let o = self.overlap_bands;
        if !(o.critical >= o.high && o.high >= o.moderate && o.moderate >= 0.0) {
            return Err(QcError::configuration(format!(
                "profile {}: overlap bands must decrease",
                self.name
            )));
        }
        if let Some(a) = self.area_bands {
            if !(0.0 <= a.low_max && a.low_max <= a.moderate_max && a.moderate_max <= a.high_max) {
                return Err(QcError::configuration(format!(
                    "profile {}: area bands must increase",
                    self.name
                )));
            }
        }
        Ok(())
    }
}
