//! Correction Manager
//!
//! Applies a correction plan as one transaction:
//!
//! ```text
//! Idle -> BackupCreated -> Applying -> Committed
//!                                   \-> RolledBack
//! ```
//!
//! Originals are never modified. Each affected layer is corrected on a
//! working copy and published as a derived layer only once every layer of
//! the plan was prepared; any failure restores the working copies from their
//! snapshots and puts back the derived layers this transaction replaced.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{QcError, Result};
use crate::model::{FeatureId, GeometryType, Layer, LayerId};

use super::plan::{CorrectionAction, CorrectionPlan};
use super::repair::GeometryRepair;
use super::snapshot::BackupSnapshot;
use super::store::{derived_layer_id, DatasetStore};

/// Transaction states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Idle,
    BackupCreated,
    Applying,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransactionState::Idle => "idle",
            TransactionState::BackupCreated => "backup_created",
            TransactionState::Applying => "applying",
            TransactionState::Committed => "committed",
            TransactionState::RolledBack => "rolled_back",
        };
        f.write_str(name)
    }
}

/// History entry of one `apply` call.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub layers: Vec<LayerId>,
    pub trace: Vec<TransactionState>,
}

impl TransactionRecord {
    pub fn state(&self) -> TransactionState {
        self.trace.last().copied().unwrap_or(TransactionState::Idle)
    }
}

/// Corrected copy of one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerCorrection {
    pub source: LayerId,
    pub derived: LayerId,
    pub deleted: usize,
    pub repaired: usize,
}

/// Result of a committed transaction.
#[derive(Debug, Clone)]
pub struct CorrectionOutcome {
    pub transaction: TransactionRecord,
    pub layers: Vec<LayerCorrection>,
}

impl CorrectionOutcome {
    pub fn deleted(&self) -> usize {
        self.layers.iter().map(|l| l.deleted).sum()
    }

    pub fn repaired(&self) -> usize {
        self.layers.iter().map(|l| l.repaired).sum()
    }
}

/// One layer prepared and waiting for commit.
struct Prepared {
    snapshot: BackupSnapshot,
    working: Layer,
    correction: LayerCorrection,
}

/// A derived layer written by this transaction and what it replaced.
struct Published {
    id: LayerId,
    previous: Option<Arc<Layer>>,
}

/// Layers currently being corrected. Released on drop.
struct InFlightGuard<'a> {
    in_flight: &'a Mutex<BTreeSet<LayerId>>,
    layers: Vec<LayerId>,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(in_flight: &'a Mutex<BTreeSet<LayerId>>, layers: Vec<LayerId>) -> Result<Self> {
        let mut held = in_flight.lock();
        if let Some(busy) = layers.iter().find(|l| held.contains(*l)) {
            return Err(QcError::LayerBusy { layer: busy.clone() });
        }
        held.extend(layers.iter().cloned());
        Ok(Self { in_flight, layers })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut held = self.in_flight.lock();
        for layer in &self.layers {
            held.remove(layer);
        }
    }
}

/// Transactional, backup-protected correction of layers in a dataset store.
pub struct CorrectionManager {
    store: Arc<dyn DatasetStore>,
    repair: Arc<dyn GeometryRepair>,
    in_flight: Mutex<BTreeSet<LayerId>>,
    history: Mutex<Vec<TransactionRecord>>,
}

impl CorrectionManager {
    pub fn new(store: Arc<dyn DatasetStore>, repair: Arc<dyn GeometryRepair>) -> Self {
        Self {
            store,
            repair,
            in_flight: Mutex::new(BTreeSet::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Every transaction so far, oldest first.
    pub fn history(&self) -> Vec<TransactionRecord> {
        self.history.lock().clone()
    }

    pub fn is_busy(&self, layer: &LayerId) -> bool {
        self.in_flight.lock().contains(layer)
    }

    /// Apply `plan` as one transaction.
    ///
    /// A layer already being corrected by another call fails with
    /// `LayerBusy` and nothing is touched. Any other failure rolls the whole
    /// transaction back and surfaces as `CorrectionFailed`.
    pub fn apply(&self, plan: &CorrectionPlan) -> Result<CorrectionOutcome> {
        if plan.is_empty() {
            return Err(QcError::configuration("correction plan is empty"));
        }
        let layers: Vec<LayerId> = plan.layers().cloned().collect();
        let _guard = InFlightGuard::acquire(&self.in_flight, layers.clone())?;

        let mut record = TransactionRecord {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            layers,
            trace: vec![TransactionState::Idle],
        };
        info!(transaction = %record.id, layers = record.layers.len(), features = plan.len(), "correction started");

        let result = self.run(plan, &mut record);
        match &result {
            Ok(_) => info!(transaction = %record.id, "correction committed"),
            Err(err) => warn!(transaction = %record.id, error = %err, "correction rolled back"),
        }
        self.history.lock().push(record.clone());

        result.map(|layers| CorrectionOutcome {
            transaction: record,
            layers,
        })
    }

    fn run(&self, plan: &CorrectionPlan, record: &mut TransactionRecord) -> Result<Vec<LayerCorrection>> {
        let mut prepared: Vec<Prepared> = Vec::new();

        for (layer_id, actions) in plan.iter() {
            let original = match self.store.layer(layer_id) {
                Ok(layer) => layer,
                Err(cause) => return Err(self.roll_back(record, &mut prepared, &[], layer_id, cause)),
            };
            let snapshot = match BackupSnapshot::capture(&original, actions.keys()) {
                Ok(snapshot) => snapshot,
                Err(cause) => return Err(self.roll_back(record, &mut prepared, &[], layer_id, cause)),
            };
            enter(record, TransactionState::BackupCreated);
            debug!(layer = %layer_id, digest = snapshot.digest(), "backup created");

            enter(record, TransactionState::Applying);
            let mut working = (*original).clone();
            match self.apply_actions(&mut working, actions) {
                Ok((deleted, repaired)) => {
                    let derived = derived_layer_id(layer_id);
                    prepared.push(Prepared {
                        snapshot,
                        working,
                        correction: LayerCorrection {
                            source: layer_id.clone(),
                            derived,
                            deleted,
                            repaired,
                        },
                    });
                }
                Err(cause) => {
                    prepared.push(Prepared {
                        snapshot,
                        working,
                        correction: LayerCorrection {
                            source: layer_id.clone(),
                            derived: derived_layer_id(layer_id),
                            deleted: 0,
                            repaired: 0,
                        },
                    });
                    return Err(self.roll_back(record, &mut prepared, &[], layer_id, cause));
                }
            }
        }

        let mut published: Vec<Published> = Vec::new();
        for n in 0..prepared.len() {
            let mut derived = prepared[n].working.clone();
            derived.id = prepared[n].correction.derived.clone();
            derived.name = format!("{} (corrected)", derived.name);
            // A derived layer from an earlier transaction is put back on rollback.
            let previous = self.store.layer(&derived.id).ok();

            if let Err(cause) = self.store.commit(derived) {
                let layer = prepared[n].correction.source.clone();
                return Err(self.roll_back(record, &mut prepared, &published, &layer, cause));
            }
            published.push(Published {
                id: prepared[n].correction.derived.clone(),
                previous,
            });
        }

        enter(record, TransactionState::Committed);
        Ok(prepared.into_iter().map(|p| p.correction).collect())
    }

    /// Delete and repair on the working copy; returns (deleted, repaired).
    fn apply_actions(
        &self,
        working: &mut Layer,
        actions: &BTreeMap<FeatureId, CorrectionAction>,
    ) -> Result<(usize, usize)> {
        let mut deleted = 0;
        let mut repaired = 0;

        for (feature_id, action) in actions {
            let position = working.position(feature_id).ok_or_else(|| QcError::FeatureNotFound {
                layer: working.id.clone(),
                feature: feature_id.clone(),
            })?;

            match action {
                CorrectionAction::Delete => {
                    working.features.remove(position);
                    deleted += 1;
                }
                CorrectionAction::Repair => {
                    if working.geometry_type != GeometryType::Polygon {
                        return Err(QcError::RepairFailed {
                            feature: feature_id.clone(),
                            reason: format!("repair is not supported on {} layers", working.geometry_type),
                        });
                    }
                    let geometry = self.repair.repair(&working.features[position], working)?;
                    working.features[position].geometry = geometry;
                    repaired += 1;
                }
            }
        }

        Ok((deleted, repaired))
    }

    /// Restore every prepared working copy, put back or withdraw published
    /// layers and build the error for the caller.
    fn roll_back(
        &self,
        record: &mut TransactionRecord,
        prepared: &mut [Prepared],
        published: &[Published],
        failed_layer: &LayerId,
        cause: QcError,
    ) -> QcError {
        let mut restored = true;

        for entry in prepared.iter_mut() {
            entry.snapshot.restore_into(&mut entry.working);
            if let Err(err) = entry.snapshot.verify(&entry.working) {
                error!(layer = %entry.correction.source, error = %err, "rollback verification failed");
                restored = false;
            }
        }
        for derived in published {
            let result = match &derived.previous {
                Some(previous) => self.store.commit((**previous).clone()).map(|_| ()),
                None => self.store.retract(&derived.id),
            };
            if let Err(err) = result {
                error!(layer = %derived.id, error = %err, "failed to restore derived layer");
                restored = false;
            }
        }

        enter(record, TransactionState::RolledBack);
        QcError::CorrectionFailed {
            layer: failed_layer.clone(),
            cause: Box::new(cause),
            rolled_back: restored,
        }
    }
}

fn enter(record: &mut TransactionRecord, state: TransactionState) {
    if record.trace.last() != Some(&state) {
        record.trace.push(state);
    }
}
