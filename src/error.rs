//! Error handling for spatial-qc
//!
//! Detection-phase errors are mostly soft: they are collected as warnings and
//! the run continues. Only configuration problems, unsupported layer
//! combinations and cancellation abort a run.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{FeatureId, GeometryType, LayerId};

/// Result type alias for spatial-qc operations
pub type Result<T> = std::result::Result<T, QcError>;

/// Main error type for spatial-qc operations
#[derive(Error, Debug)]
pub enum QcError {
    // Geometry Errors
    #[error("Invalid geometry for feature {feature} in layer {layer}: {reason}")]
    GeometryInvalid {
        layer: LayerId,
        feature: FeatureId,
        reason: String,
    },

    // Fusion Errors
    #[error("Layer {layer} is not compatible with {reference}: {reason}")]
    Compatibility {
        layer: LayerId,
        reference: LayerId,
        reason: String,
    },

    // Precondition Errors
    #[error("Configuration error: {reason}")]
    Configuration { reason: String },

    #[error("Unsupported layer combination: {}", format_types(.types))]
    NotSupported { types: Vec<GeometryType> },

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Analysis worker failed: {reason}")]
    Worker { reason: String },

    // Correction Errors
    #[error("Correction of layer {layer} failed ({}): {cause}", rollback_outcome(*.rolled_back))]
    CorrectionFailed {
        layer: LayerId,
        #[source]
        cause: Box<QcError>,
        rolled_back: bool,
    },

    #[error("Layer {layer} already has a correction in progress")]
    LayerBusy { layer: LayerId },

    #[error("Layer not found: {layer}")]
    LayerNotFound { layer: LayerId },

    #[error("Feature {feature} not found in layer {layer}")]
    FeatureNotFound { layer: LayerId, feature: FeatureId },

    #[error("Geometry repair failed for feature {feature}: {reason}")]
    RepairFailed { feature: FeatureId, reason: String },

    #[error("Dataset store rejected layer {layer}: {reason}")]
    StoreFailed { layer: LayerId, reason: String },

    #[error("Rollback verification failed for layer {layer}")]
    RollbackMismatch { layer: LayerId },

    // I/O Errors
    #[error("Failed to read file: {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file: {path}: {source}")]
    FileWriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn rollback_outcome(rolled_back: bool) -> &'static str {
    if rolled_back {
        "rolled back"
    } else {
        "rollback incomplete"
    }
}

fn format_types(types: &[GeometryType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(" + ")
}

impl QcError {
    /// Shorthand for a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        QcError::Configuration {
            reason: reason.into(),
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            QcError::GeometryInvalid { .. } => "GEOMETRY_INVALID",
            QcError::Compatibility { .. } => "COMPATIBILITY",
            QcError::Configuration { .. } => "CONFIGURATION",
            QcError::NotSupported { .. } => "NOT_SUPPORTED",
            QcError::Cancelled => "CANCELLED",
            QcError::Worker { .. } => "WORKER_FAILED",
            QcError::CorrectionFailed { .. } => "CORRECTION_FAILED",
            QcError::LayerBusy { .. } => "LAYER_BUSY",
            QcError::LayerNotFound { .. } => "LAYER_NOT_FOUND",
            QcError::FeatureNotFound { .. } => "FEATURE_NOT_FOUND",
            QcError::RepairFailed { .. } => "REPAIR_FAILED",
            QcError::StoreFailed { .. } => "STORE_FAILED",
            QcError::RollbackMismatch { .. } => "ROLLBACK_MISMATCH",
            QcError::FileReadError { .. } => "FILE_READ_ERROR",
            QcError::FileWriteError { .. } => "FILE_WRITE_ERROR",
            QcError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Soft errors are reported alongside results instead of aborting a run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            QcError::GeometryInvalid { .. }
                | QcError::Compatibility { .. }
                | QcError::LayerBusy { .. }
        )
    }

    /// Returns a user-friendly recovery suggestion.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            QcError::GeometryInvalid { .. } => {
                Some("Fix the geometry in the source layer; the feature was left out of the analysis.")
            }
            QcError::Compatibility { .. } => Some(
                "Only the first layer was analysed. Align field names, field types, geometry type and CRS to analyse all layers together.",
            ),
            QcError::Configuration { .. } => Some("Check the analysis configuration and layer selection."),
            QcError::NotSupported { .. } => Some(
                "Select points, lines or polygons alone, or points together with polygons.",
            ),
            QcError::Cancelled => Some("Start a new analysis run."),
            QcError::CorrectionFailed { rolled_back: true, .. } => {
                Some("The layer was restored. Review the selected corrections and retry.")
            }
            QcError::CorrectionFailed { rolled_back: false, .. } => {
                Some("Some derived layers could not be restored. Check the dataset store before retrying.")
            }
            QcError::LayerBusy { .. } => Some("Wait for the running correction to finish."),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = QcError::configuration("too many layers");
        assert_eq!(err.error_code(), "CONFIGURATION");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_soft_errors_are_recoverable() {
        let err = QcError::GeometryInvalid {
            layer: LayerId::from("parcels"),
            feature: FeatureId::from("12"),
            reason: "ring has fewer than 3 distinct vertices".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.recovery_suggestion().is_some());
    }

    #[test]
    fn test_not_supported_lists_types() {
        let err = QcError::NotSupported {
            types: vec![GeometryType::Point, GeometryType::Line],
        };
        assert_eq!(err.to_string(), "Unsupported layer combination: point + line");
    }

    #[test]
    fn test_correction_failure_keeps_cause() {
        let err = QcError::CorrectionFailed {
            layer: LayerId::from("parcels"),
            cause: Box::new(QcError::StoreFailed {
                layer: LayerId::from("parcels"),
                reason: "disk full".to_string(),
            }),
            rolled_back: true,
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(
            source.as_deref(),
            Some("Dataset store rejected layer parcels: disk full")
        );
    }

    #[test]
    fn test_correction_failure_message_follows_rollback() {
        let failure = |rolled_back| QcError::CorrectionFailed {
            layer: LayerId::from("parcels"),
            cause: Box::new(QcError::LayerNotFound {
                layer: LayerId::from("parcels"),
            }),
            rolled_back,
        };
        assert_eq!(
            failure(true).to_string(),
            "Correction of layer parcels failed (rolled back): Layer not found: parcels"
        );
        assert_eq!(
            failure(false).to_string(),
            "Correction of layer parcels failed (rollback incomplete): Layer not found: parcels"
        );
        assert_ne!(failure(true).recovery_suggestion(), failure(false).recovery_suggestion());
    }
}
