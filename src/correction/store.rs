//! Dataset store: where layers are read from and corrected layers published.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::error::{QcError, Result};
use crate::model::{Layer, LayerId};

/// Storage collaborator of the correction manager.
pub trait DatasetStore: Send + Sync {
    fn layer(&self, id: &LayerId) -> Result<Arc<Layer>>;

    /// Publish a derived layer under its own id.
    fn commit(&self, layer: Layer) -> Result<LayerId>;

    /// Withdraw a previously committed derived layer.
    fn retract(&self, id: &LayerId) -> Result<()>;
}

/// Id under which the corrected copy of `original` is published.
pub fn derived_layer_id(original: &LayerId) -> LayerId {
    LayerId::new(format!("{}_corrected", original))
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    layers: RwLock<BTreeMap<LayerId, Arc<Layer>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(layers: impl IntoIterator<Item = Layer>) -> Self {
        let store = Self::new();
        for layer in layers {
            store.insert(layer);
        }
        store
    }

    pub fn insert(&self, layer: Layer) -> Arc<Layer> {
        let layer = Arc::new(layer);
        self.layers.write().insert(layer.id.clone(), Arc::clone(&layer));
        layer
    }

    pub fn get(&self, id: &LayerId) -> Option<Arc<Layer>> {
        self.layers.read().get(id).cloned()
    }

    pub fn contains(&self, id: &LayerId) -> bool {
        self.layers.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<LayerId> {
        self.layers.read().keys().cloned().collect()
    }
}

impl DatasetStore for InMemoryStore {
    fn layer(&self, id: &LayerId) -> Result<Arc<Layer>> {
        self.get(id).ok_or_else(|| QcError::LayerNotFound { layer: id.clone() })
    }

    fn commit(&self, layer: Layer) -> Result<LayerId> {
        let id = layer.id.clone();
        debug!(layer = %id, features = layer.len(), "layer committed");
        self.layers.write().insert(id.clone(), Arc::new(layer));
        Ok(id)
    }

    fn retract(&self, id: &LayerId) -> Result<()> {
        match self.layers.write().remove(id) {
            Some(_) => Ok(()),
            None => Err(QcError::LayerNotFound { layer: id.clone() }),
        }
    }
}
