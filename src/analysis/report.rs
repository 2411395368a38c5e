//! Analysis results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::anomaly::{AnomalyKind, AnomalyRecord, Severity};
use crate::classify::Profile;
use crate::detect::DetectionMode;
use crate::error::QcError;

/// Result of one analysis run.
///
/// Records are sorted by severity (most severe first), then kind and keys,
/// and contain no duplicate (kind, keys) entries.
#[derive(Debug)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub finished_at: DateTime<Utc>,
    pub mode: DetectionMode,
    pub profile: Profile,
    records: Vec<AnomalyRecord>,
    /// Soft errors: excluded geometries and fusion fallbacks.
    pub warnings: Vec<QcError>,
    /// Set when incompatible layers forced a single-layer analysis.
    pub degraded: bool,
    /// Geometries repaired by the normalizer.
    pub repaired: usize,
    /// Features left out because their geometry was irreparable.
    pub excluded: usize,
}

impl AnalysisReport {
    pub(crate) fn new(mode: DetectionMode, profile: Profile, mut records: Vec<AnomalyRecord>) -> Self {
        normalize(&mut records);
        Self {
            run_id: Uuid::new_v4(),
            finished_at: Utc::now(),
            mode,
            profile,
            records,
            warnings: Vec::new(),
            degraded: false,
            repaired: 0,
            excluded: 0,
        }
    }

    pub fn records(&self) -> &[AnomalyRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnomalyRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn of_kind(&self, kind: AnomalyKind) -> impl Iterator<Item = &AnomalyRecord> {
        self.records.iter().filter(move |r| r.kind() == kind)
    }

    pub fn severity_counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for record in &self.records {
            *counts.entry(record.severity()).or_insert(0) += 1;
        }
        counts
    }

    /// The same findings classified under `profile`, without rerunning detection.
    pub fn reclassify(mut self, profile: &Profile) -> Self {
        let mut records: Vec<AnomalyRecord> = self.records.iter().map(|r| r.reclassify(profile)).collect();
        normalize(&mut records);
        self.records = records;
        self.profile = profile.clone();
        self
    }
}

impl IntoIterator for AnalysisReport {
    type Item = AnomalyRecord;
    type IntoIter = std::vec::IntoIter<AnomalyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a AnalysisReport {
    type Item = &'a AnomalyRecord;
    type IntoIter = std::slice::Iter<'a, AnomalyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Drop repeated (kind, keys), then sort by (severity desc, kind, keys).
fn normalize(records: &mut Vec<AnomalyRecord>) {
    records.sort_by(|a, b| a.identity().cmp(&b.identity()));
    records.dedup_by(|a, b| a.identity() == b.identity());
    records.sort_by(|a, b| {
        b.severity()
            .cmp(&a.severity())
            .then_with(|| a.identity().cmp(&b.identity()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{Finding, Measure};
    use crate::model::FeatureKey;

    fn proximity(a: &str, b: &str, distance: f64) -> AnomalyRecord {
        Finding::pair(
            AnomalyKind::PointProximity,
            FeatureKey::new("pts", a),
            FeatureKey::new("pts", b),
            Measure::distance(distance),
        )
        .classify(&Profile::cadastre())
    }

    #[test]
    fn test_sorted_and_deduplicated() {
        let records = vec![
            proximity("1", "2", 1.5),
            proximity("3", "4", 0.01),
            proximity("2", "1", 1.5),
        ];
        let report = AnalysisReport::new(DetectionMode::Points, Profile::cadastre(), records);

        assert_eq!(report.len(), 2);
        assert_eq!(report.records()[0].severity(), Severity::Critical);
        assert_eq!(report.records()[1].severity(), Severity::Low);
    }

    #[test]
    fn test_orphan_reported_twice_kept_once() {
        let orphan = || {
            Finding::single(
                AnomalyKind::OrphanPoint,
                FeatureKey::new("markers", "9"),
                Measure::Unmeasured,
            )
            .classify(&Profile::cadastre())
        };
        let report = AnalysisReport::new(DetectionMode::PointPolygon, Profile::cadastre(), vec![orphan(), orphan()]);
        assert_eq!(report.len(), 1);
    }

    #[test]
    fn test_reclassify_keeps_records() {
        let report = AnalysisReport::new(
            DetectionMode::Points,
            Profile::cadastre(),
            vec![proximity("1", "2", 1.5)],
        );
        assert_eq!(report.severity_counts().get(&Severity::Low), Some(&1));

        let report = report.reclassify(&Profile::hydrology());
        assert_eq!(report.len(), 1);
        assert_eq!(report.severity_counts().get(&Severity::High), Some(&1));
        assert_eq!(report.profile.name, "Hydrology");
    }
}
