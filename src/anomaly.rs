//! Anomaly records produced by the detectors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::classify::{classify, Profile};
use crate::model::FeatureKey;

/// Severity tier, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Moderate,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Moderate => "moderate",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    PointProximity,
    LineDuplicate,
    LineOverlap,
    CrossingWithoutNode,
    DanglingEndpoint,
    LineSelfIntersection,
    PolygonOverlap,
    InterLayerOverlap,
    OrphanPoint,
    OrphanPolygon,
    AmbiguousAssociation,
    VertexCountMismatch,
    PointVertexMismatch,
    SharedVertexMissing,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::PointProximity => "point_proximity",
            AnomalyKind::LineDuplicate => "line_duplicate",
            AnomalyKind::LineOverlap => "line_overlap",
            AnomalyKind::CrossingWithoutNode => "crossing_without_node",
            AnomalyKind::DanglingEndpoint => "dangling_endpoint",
            AnomalyKind::LineSelfIntersection => "line_self_intersection",
            AnomalyKind::PolygonOverlap => "polygon_overlap",
            AnomalyKind::InterLayerOverlap => "inter_layer_overlap",
            AnomalyKind::OrphanPoint => "orphan_point",
            AnomalyKind::OrphanPolygon => "orphan_polygon",
            AnomalyKind::AmbiguousAssociation => "ambiguous_association",
            AnomalyKind::VertexCountMismatch => "vertex_count_mismatch",
            AnomalyKind::PointVertexMismatch => "point_vertex_mismatch",
            AnomalyKind::SharedVertexMissing => "shared_vertex_missing",
        }
    }

    /// Kinds relating two peers; their keys are stored in ascending order.
    pub fn is_symmetric(&self) -> bool {
        matches!(
            self,
            AnomalyKind::PointProximity
                | AnomalyKind::LineDuplicate
                | AnomalyKind::LineOverlap
                | AnomalyKind::CrossingWithoutNode
                | AnomalyKind::PolygonOverlap
                | AnomalyKind::InterLayerOverlap
                | AnomalyKind::SharedVertexMissing
        )
    }

    /// Severity of kinds that do not scale with their measure.
    pub fn fixed_severity(&self) -> Option<Severity> {
        match self {
            AnomalyKind::LineDuplicate
            | AnomalyKind::OrphanPoint
            | AnomalyKind::OrphanPolygon
            | AnomalyKind::PointVertexMismatch => Some(Severity::Critical),
            AnomalyKind::CrossingWithoutNode
            | AnomalyKind::LineSelfIntersection
            | AnomalyKind::AmbiguousAssociation
            | AnomalyKind::VertexCountMismatch
            | AnomalyKind::SharedVertexMissing => Some(Severity::High),
            AnomalyKind::PointProximity
            | AnomalyKind::LineOverlap
            | AnomalyKind::DanglingEndpoint
            | AnomalyKind::PolygonOverlap
            | AnomalyKind::InterLayerOverlap => None,
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quantity behind an anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Measure {
    Distance { value: f64 },
    Overlap { area: f64, ratio: f64 },
    SharedLength { length: f64, ratio: f64 },
    Gap { value: f64 },
    Count { value: usize },
    Unmeasured,
}

impl Measure {
    pub fn distance(value: f64) -> Self {
        Measure::Distance { value }
    }

    pub fn gap(value: f64) -> Self {
        Measure::Gap { value }
    }

    pub fn count(value: usize) -> Self {
        Measure::Count { value }
    }

    /// The single headline number: distance, area, length, gap or count.
    pub fn value(&self) -> f64 {
        match *self {
            Measure::Distance { value } | Measure::Gap { value } => value,
            Measure::Overlap { area, .. } => area,
            Measure::SharedLength { length, .. } => length,
            Measure::Count { value } => value as f64,
            Measure::Unmeasured => 0.0,
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Measure::Distance { value } => write!(f, "{:.4}", value),
            Measure::Overlap { area, ratio } => write!(f, "{:.4} ({:.1}%)", area, ratio * 100.0),
            Measure::SharedLength { length, ratio } => {
                write!(f, "{:.4} ({:.1}%)", length, ratio * 100.0)
            }
            Measure::Gap { value } => write!(f, "gap {:.4}", value),
            Measure::Count { value } => write!(f, "{}", value),
            Measure::Unmeasured => write!(f, "-"),
        }
    }
}

/// An unclassified detector hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub kind: AnomalyKind,
    pub primary: FeatureKey,
    pub secondary: Option<FeatureKey>,
    pub measure: Measure,
    pub conflict: Option<geo::Geometry<f64>>,
}

impl Finding {
    pub fn single(kind: AnomalyKind, primary: FeatureKey, measure: Measure) -> Self {
        Self {
            kind,
            primary,
            secondary: None,
            measure,
            conflict: None,
        }
    }

    pub fn pair(kind: AnomalyKind, a: FeatureKey, b: FeatureKey, measure: Measure) -> Self {
        Self {
            kind,
            primary: a,
            secondary: Some(b),
            measure,
            conflict: None,
        }
    }

    pub fn with_conflict(mut self, conflict: impl Into<geo::Geometry<f64>>) -> Self {
        self.conflict = Some(conflict.into());
        self
    }

    pub fn classify(self, profile: &Profile) -> AnomalyRecord {
        let severity = classify(self.kind, &self.measure, profile);
        let (primary, secondary) = match self.secondary {
            Some(b) if self.kind.is_symmetric() && b < self.primary => (b, Some(self.primary)),
            other => (self.primary, other),
        };
        AnomalyRecord {
            kind: self.kind,
            primary,
            secondary,
            measure: self.measure,
            severity,
            conflict: self.conflict,
        }
    }
}

/// A classified anomaly. Immutable: reclassifying yields a new record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    kind: AnomalyKind,
    primary: FeatureKey,
    secondary: Option<FeatureKey>,
    measure: Measure,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    conflict: Option<geo::Geometry<f64>>,
}

impl AnomalyRecord {
    pub fn kind(&self) -> AnomalyKind {
        self.kind
    }

    pub fn primary(&self) -> &FeatureKey {
        &self.primary
    }

    pub fn secondary(&self) -> Option<&FeatureKey> {
        self.secondary.as_ref()
    }

    /// Involved features, primary first.
    pub fn keys(&self) -> impl Iterator<Item = &FeatureKey> {
        std::iter::once(&self.primary).chain(self.secondary.as_ref())
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Geometry for display only.
    pub fn conflict(&self) -> Option<&geo::Geometry<f64>> {
        self.conflict.as_ref()
    }

    /// The same anomaly classified under another profile.
    pub fn reclassify(&self, profile: &Profile) -> AnomalyRecord {
        AnomalyRecord {
            severity: classify(self.kind, &self.measure, profile),
            ..self.clone()
        }
    }

    /// Identity used for deduplication.
    pub(crate) fn identity(&self) -> (AnomalyKind, &FeatureKey, Option<&FeatureKey>) {
        (self.kind, &self.primary, self.secondary.as_ref())
    }
}

impl fmt::Display for AnomalyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.severity, self.kind, self.primary)?;
        if let Some(secondary) = &self.secondary {
            write!(f, " <-> {}", secondary)?;
        }
        write!(f, ": {}", self.measure)
    }
}
