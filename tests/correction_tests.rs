//! Correction Tests
//!
//! Transactions against a dataset store, including forced failures.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use spatial_qc::correction::{
    CorrectionAction, TransactionState, TrimOverlapRepair, ValidityRepair,
};
use spatial_qc::{
    run_analysis, AnalysisConfig, CorrectionManager, CorrectionPlan, Crs, DatasetStore, Feature, FeatureKey,
    Geometry, GeometryType, InMemoryStore, Layer, LayerId, QcError, Result, RunControl,
};

fn crs() -> Crs {
    Crs::new("EPSG:2154")
}

fn parcels(id: &str) -> Layer {
    Layer::new(id, GeometryType::Polygon, crs())
        .with_feature(Feature::new("a", Geometry::rect((0.0, 0.0), (10.0, 10.0), crs())))
        .with_feature(Feature::new("b", Geometry::rect((5.0, 5.0), (15.0, 15.0), crs())))
        .with_feature(Feature::new("c", Geometry::rect((20.0, 0.0), (30.0, 10.0), crs())))
}

/// Store that refuses to publish one derived layer.
struct FailingStore {
    inner: InMemoryStore,
    reject: LayerId,
}

impl DatasetStore for FailingStore {
    fn layer(&self, id: &LayerId) -> Result<Arc<Layer>> {
        self.inner.layer(id)
    }

    fn commit(&self, layer: Layer) -> Result<LayerId> {
        if layer.id == self.reject {
            return Err(QcError::StoreFailed {
                layer: layer.id,
                reason: "disk full".to_string(),
            });
        }
        self.inner.commit(layer)
    }

    fn retract(&self, id: &LayerId) -> Result<()> {
        self.inner.retract(id)
    }
}

#[test]
fn test_trim_repair_removes_overlap() {
    let store = Arc::new(InMemoryStore::with_layers([parcels("parcels")]));
    let manager = CorrectionManager::new(store.clone(), Arc::new(TrimOverlapRepair::default()));

    let layers = vec![store.get(&LayerId::from("parcels")).unwrap()];
    let report = run_analysis(&layers, &AnalysisConfig::default(), &RunControl::new()).unwrap();
    let plan = CorrectionPlan::from_records(&report);
    assert_eq!(plan.len(), 1);

    let outcome = manager.apply(&plan).unwrap();
    assert_eq!(outcome.repaired(), 1);
    assert_eq!(outcome.transaction.state(), TransactionState::Committed);

    let corrected = store.get(&LayerId::from("parcels_corrected")).unwrap();
    let rerun = run_analysis(&[corrected], &AnalysisConfig::default(), &RunControl::new()).unwrap();
    assert!(rerun.is_empty());
}

#[test]
fn test_original_layer_is_never_modified() {
    let original = parcels("parcels");
    let store = Arc::new(InMemoryStore::with_layers([original.clone()]));
    let manager = CorrectionManager::new(store.clone(), Arc::new(ValidityRepair::default()));

    let plan = CorrectionPlan::new()
        .with(FeatureKey::new("parcels", "c"), CorrectionAction::Delete)
        .with(FeatureKey::new("parcels", "a"), CorrectionAction::Repair);
    let outcome = manager.apply(&plan).unwrap();

    assert_eq!(outcome.deleted(), 1);
    assert_eq!(outcome.repaired(), 1);
    assert_eq!(*store.get(&LayerId::from("parcels")).unwrap(), original);
    assert_eq!(store.get(&LayerId::from("parcels_corrected")).unwrap().len(), 2);
}

#[test]
fn test_failed_commit_rolls_back_every_layer() {
    let inner = InMemoryStore::with_layers([parcels("alpha"), parcels("beta")]);
    let store = Arc::new(FailingStore {
        inner,
        reject: LayerId::from("beta_corrected"),
    });
    let manager = CorrectionManager::new(store.clone(), Arc::new(ValidityRepair::default()));

    let plan = CorrectionPlan::new()
        .with(FeatureKey::new("alpha", "a"), CorrectionAction::Delete)
        .with(FeatureKey::new("beta", "b"), CorrectionAction::Delete);

    match manager.apply(&plan).unwrap_err() {
        QcError::CorrectionFailed {
            layer,
            cause,
            rolled_back,
        } => {
            assert_eq!(layer, LayerId::from("beta"));
            assert_eq!(cause.error_code(), "STORE_FAILED");
            assert!(rolled_back);
        }
        other => panic!("unexpected error: {other}"),
    }

    // alpha_corrected was published first and must be withdrawn again.
    assert!(!store.inner.contains(&LayerId::from("alpha_corrected")));
    assert!(!store.inner.contains(&LayerId::from("beta_corrected")));
    assert_eq!(*store.inner.get(&LayerId::from("alpha")).unwrap(), parcels("alpha"));
    assert_eq!(*store.inner.get(&LayerId::from("beta")).unwrap(), parcels("beta"));

    let history = manager.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].state(), TransactionState::RolledBack);
    assert!(!manager.is_busy(&LayerId::from("alpha")));
}

#[test]
fn test_failed_commit_keeps_earlier_derived_layer() {
    let inner = InMemoryStore::with_layers([parcels("alpha"), parcels("beta")]);
    let store = Arc::new(FailingStore {
        inner,
        reject: LayerId::from("beta_corrected"),
    });
    let manager = CorrectionManager::new(store.clone(), Arc::new(ValidityRepair::default()));

    let first = CorrectionPlan::new().with(FeatureKey::new("alpha", "c"), CorrectionAction::Delete);
    manager.apply(&first).unwrap();
    let committed = store.inner.get(&LayerId::from("alpha_corrected")).unwrap();
    assert_eq!(committed.len(), 2);

    let second = CorrectionPlan::new()
        .with(FeatureKey::new("alpha", "a"), CorrectionAction::Delete)
        .with(FeatureKey::new("beta", "b"), CorrectionAction::Delete);
    match manager.apply(&second).unwrap_err() {
        QcError::CorrectionFailed { rolled_back, .. } => assert!(rolled_back),
        other => panic!("unexpected error: {other}"),
    }

    let after = store.inner.get(&LayerId::from("alpha_corrected")).unwrap();
    assert_eq!(*after, *committed);
    assert!(!store.inner.contains(&LayerId::from("beta_corrected")));
}

#[test]
fn test_unknown_feature_rolls_back() {
    let store = Arc::new(InMemoryStore::with_layers([parcels("parcels")]));
    let manager = CorrectionManager::new(store.clone(), Arc::new(ValidityRepair::default()));

    let plan = CorrectionPlan::new().with(FeatureKey::new("parcels", "zz"), CorrectionAction::Delete);
    match manager.apply(&plan).unwrap_err() {
        QcError::CorrectionFailed { cause, .. } => assert_eq!(cause.error_code(), "FEATURE_NOT_FOUND"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.ids(), vec![LayerId::from("parcels")]);
}

#[test]
fn test_empty_plan_is_rejected() {
    let store = Arc::new(InMemoryStore::new());
    let manager = CorrectionManager::new(store, Arc::new(ValidityRepair::default()));
    assert_eq!(
        manager.apply(&CorrectionPlan::new()).unwrap_err().error_code(),
        "CONFIGURATION"
    );
    assert!(manager.history().is_empty());
}

#[test]
fn test_sequential_transactions_are_recorded() {
    let store = Arc::new(InMemoryStore::with_layers([parcels("parcels")]));
    let manager = CorrectionManager::new(store, Arc::new(ValidityRepair::default()));

    let first = CorrectionPlan::new().with(FeatureKey::new("parcels", "a"), CorrectionAction::Delete);
    let second = CorrectionPlan::new().with(FeatureKey::new("parcels", "c"), CorrectionAction::Delete);
    let one = manager.apply(&first).unwrap();
    let two = manager.apply(&second).unwrap();

    assert_ne!(one.transaction.id, two.transaction.id);
    let history = manager.history();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|t| t.state() == TransactionState::Committed));
}
