//! Correction plans: which features of which origin layers to change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::anomaly::{AnomalyKind, AnomalyRecord};
use crate::model::{FeatureId, FeatureKey, LayerId};

/// What to do with one feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionAction {
    Delete,
    Repair,
}

/// Layer id to feature id to action, both in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrectionPlan {
    layers: BTreeMap<LayerId, BTreeMap<FeatureId, CorrectionAction>>,
}

impl CorrectionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; a later action for the same feature replaces the earlier one.
    pub fn insert(&mut self, key: FeatureKey, action: CorrectionAction) -> &mut Self {
        self.layers
            .entry(key.layer)
            .or_default()
            .insert(key.feature, action);
        self
    }

    pub fn with(mut self, key: FeatureKey, action: CorrectionAction) -> Self {
        self.insert(key, action);
        self
    }

    /// Plan for a selected subset of anomalies.
    ///
    /// Duplicates and proximity pairs delete the second feature of the pair;
    /// overlaps repair it; single-feature anomalies delete that feature.
    /// Cadastral mismatches have no automatic correction and are skipped.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AnomalyRecord>) -> Self {
        let mut plan = Self::new();
        for record in records {
            let target = record.secondary().unwrap_or(record.primary()).clone();
            match record.kind() {
                AnomalyKind::PointProximity | AnomalyKind::LineDuplicate => {
                    plan.insert(target, CorrectionAction::Delete);
                }
                AnomalyKind::PolygonOverlap | AnomalyKind::InterLayerOverlap => {
                    plan.insert(target, CorrectionAction::Repair);
                }
                AnomalyKind::OrphanPoint | AnomalyKind::OrphanPolygon => {
                    plan.insert(record.primary().clone(), CorrectionAction::Delete);
                }
                AnomalyKind::LineOverlap
                | AnomalyKind::CrossingWithoutNode
                | AnomalyKind::DanglingEndpoint
                | AnomalyKind::LineSelfIntersection
                | AnomalyKind::AmbiguousAssociation
                | AnomalyKind::VertexCountMismatch
                | AnomalyKind::PointVertexMismatch
                | AnomalyKind::SharedVertexMissing => {}
            }
        }
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.layers.values().all(BTreeMap::is_empty)
    }

    /// Number of targeted features.
    pub fn len(&self) -> usize {
        self.layers.values().map(BTreeMap::len).sum()
    }

    pub fn layers(&self) -> impl Iterator<Item = &LayerId> {
        self.layers.keys()
    }

    pub fn actions(&self, layer: &LayerId) -> Option<&BTreeMap<FeatureId, CorrectionAction>> {
        self.layers.get(layer)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&LayerId, &BTreeMap<FeatureId, CorrectionAction>)> {
        self.layers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{Finding, Measure};
    use crate::classify::Profile;

    #[test]
    fn test_from_records() {
        let profile = Profile::cadastre();
        let records = vec![
            Finding::pair(
                AnomalyKind::PolygonOverlap,
                FeatureKey::new("parcels", "1"),
                FeatureKey::new("parcels", "2"),
                Measure::Overlap { area: 4.0, ratio: 0.1 },
            )
            .classify(&profile),
            Finding::pair(
                AnomalyKind::PointProximity,
                FeatureKey::new("markers", "7"),
                FeatureKey::new("markers", "3"),
                Measure::distance(0.0),
            )
            .classify(&profile),
            Finding::single(AnomalyKind::VertexCountMismatch, FeatureKey::new("parcels", "1"), Measure::count(1))
                .classify(&profile),
        ];

        let plan = CorrectionPlan::from_records(&records);
        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan.actions(&LayerId::from("parcels")).unwrap().get(&FeatureId::from("2")),
            Some(&CorrectionAction::Repair)
        );
        assert_eq!(
            plan.actions(&LayerId::from("markers")).unwrap().get(&FeatureId::from("7")),
            Some(&CorrectionAction::Delete)
        );
    }

    #[test]
    fn test_plan_json() {
        let plan = CorrectionPlan::new().with(FeatureKey::new("parcels", "4"), CorrectionAction::Delete);
        let json = serde_json::to_string(&plan).unwrap();
        assert_eq!(json, r#"{"parcels":{"4":"delete"}}"#);
        let back: CorrectionPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
