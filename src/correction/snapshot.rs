//! Backup snapshots of the features a transaction is about to touch.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::{QcError, Result};
use crate::model::{Feature, FeatureId, Layer, LayerId};

/// Copy of targeted features with their original positions.
///
/// Content-addressed: the digest is the SHA-256 of the serialized entries.
#[derive(Debug, Clone)]
pub struct BackupSnapshot {
    pub layer: LayerId,
    pub taken_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
    digest: String,
}

#[derive(Debug, Clone, Serialize)]
struct SnapshotEntry {
    position: usize,
    feature: Feature,
}

impl BackupSnapshot {
    /// Snapshot `ids` from `layer`; every id must exist.
    pub fn capture<'a>(layer: &Layer, ids: impl IntoIterator<Item = &'a FeatureId>) -> Result<Self> {
        let mut entries = Vec::new();
        for id in ids {
            let position = layer.position(id).ok_or_else(|| QcError::FeatureNotFound {
                layer: layer.id.clone(),
                feature: id.clone(),
            })?;
            entries.push(SnapshotEntry {
                position,
                feature: layer.features[position].clone(),
            });
        }
        entries.sort_by_key(|e| e.position);
        let digest = digest_of(&entries)?;

        Ok(Self {
            layer: layer.id.clone(),
            taken_at: Utc::now(),
            entries,
            digest,
        })
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Put the snapshotted features back, at their original positions.
    ///
    /// Assumes features outside the snapshot were left alone.
    pub fn restore_into(&self, working: &mut Layer) {
        for entry in &self.entries {
            match working.position(&entry.feature.id) {
                Some(position) => working.features[position] = entry.feature.clone(),
                None => {
                    let position = entry.position.min(working.features.len());
                    working.features.insert(position, entry.feature.clone());
                }
            }
        }
    }

    /// Check that `working` holds exactly the snapshotted content again.
    pub fn verify(&self, working: &Layer) -> Result<()> {
        let ids: Vec<&FeatureId> = self.entries.iter().map(|e| &e.feature.id).collect();
        let current = BackupSnapshot::capture(working, ids).map_err(|_| QcError::RollbackMismatch {
            layer: self.layer.clone(),
        })?;
        if current.digest != self.digest {
            return Err(QcError::RollbackMismatch {
                layer: self.layer.clone(),
            });
        }
        Ok(())
    }
}

fn digest_of(entries: &[SnapshotEntry]) -> Result<String> {
    let content = serde_json::to_vec(entries)?;
    let hash = Sha256::digest(&content);
    Ok(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Crs, Geometry, GeometryType};

    fn parcels() -> Layer {
        let crs = Crs::new("EPSG:2154");
        let mut layer = Layer::new("parcels", GeometryType::Polygon, crs.clone());
        for i in 0..4u64 {
            let x = i as f64 * 10.0;
            layer = layer.with_feature(Feature::new(i, Geometry::rect((x, 0.0), (x + 5.0, 5.0), crs.clone())));
        }
        layer
    }

    #[test]
    fn test_restore_after_delete() {
        let original = parcels();
        let ids = [FeatureId::from(1u64), FeatureId::from(3u64)];
        let snapshot = BackupSnapshot::capture(&original, &ids).unwrap();
        assert_eq!(snapshot.len(), 2);

        let mut working = original.clone();
        working.features.retain(|f| !ids.contains(&f.id));
        assert_eq!(working.len(), 2);

        snapshot.restore_into(&mut working);
        assert_eq!(working, original);
        snapshot.verify(&working).unwrap();
    }

    #[test]
    fn test_verify_detects_change() {
        let original = parcels();
        let ids = [FeatureId::from(2u64)];
        let snapshot = BackupSnapshot::capture(&original, &ids).unwrap();

        let mut working = original.clone();
        working.features[2].geometry = Geometry::rect((0.0, 0.0), (1.0, 1.0), Crs::new("EPSG:2154"));
        assert_eq!(
            snapshot.verify(&working).unwrap_err().error_code(),
            "ROLLBACK_MISMATCH"
        );
    }

    #[test]
    fn test_unknown_feature() {
        let ids = [FeatureId::from("missing")];
        let err = BackupSnapshot::capture(&parcels(), &ids).unwrap_err();
        assert_eq!(err.error_code(), "FEATURE_NOT_FOUND");
    }

    #[test]
    fn test_digest_is_stable() {
        let ids = [FeatureId::from(0u64)];
        let a = BackupSnapshot::capture(&parcels(), &ids).unwrap();
        let b = BackupSnapshot::capture(&parcels(), &ids).unwrap();
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
    }
}
