//! Transactional correction of layers.

mod manager;
mod plan;
mod repair;
mod snapshot;
mod store;

pub use manager::{
    CorrectionManager, CorrectionOutcome, LayerCorrection, TransactionRecord, TransactionState,
};
pub use plan::{CorrectionAction, CorrectionPlan};
pub use repair::{GeometryRepair, TrimOverlapRepair, ValidityRepair};
pub use snapshot::BackupSnapshot;
pub use store::{derived_layer_id, DatasetStore, InMemoryStore};
