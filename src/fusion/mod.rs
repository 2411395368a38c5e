//! Layer Fusion
//!
//! Merges up to [`MAX_FUSED_LAYERS`] layers of the same geometry type, schema
//! and coordinate system into one virtual dataset. Every fused feature keeps
//! a tag naming its origin layer, so anomalies and corrections always refer
//! to the real source.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{QcError, Result};
use crate::model::{Crs, Feature, FieldSchema, GeometryType, Layer, LayerId};

/// Hard cap on the number of layers analysed together.
pub const MAX_FUSED_LAYERS: usize = 4;

/// Source-tagged union of compatible layers.
#[derive(Debug, Clone)]
pub struct FusedDataset {
    pub id: LayerId,
    pub sources: Vec<LayerId>,
    pub geometry_type: GeometryType,
    pub crs: Crs,
    pub schema: FieldSchema,
    pub features: Vec<Feature>,
}

impl FusedDataset {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn is_multi_source(&self) -> bool {
        self.sources.len() > 1
    }

    /// Features that came from `source`.
    pub fn features_from<'a>(&'a self, source: &'a LayerId) -> impl Iterator<Item = &'a Feature> + 'a {
        self.features
            .iter()
            .filter(move |f| f.source_layer.as_ref() == Some(source))
    }

    fn from_layer(layer: &Layer) -> Self {
        let features = layer
            .features
            .iter()
            .map(|f| {
                let mut tagged = f.clone();
                tagged.source_layer = Some(layer.id.clone());
                tagged
            })
            .collect();

        Self {
            id: layer.id.clone(),
            sources: vec![layer.id.clone()],
            geometry_type: layer.geometry_type,
            crs: layer.crs.clone(),
            schema: layer.schema.clone(),
            features,
        }
    }
}

/// Outcome of a fusion attempt that may have fallen back to a single layer.
#[derive(Debug)]
pub struct FusionOutcome {
    pub dataset: FusedDataset,
    /// Set when the layers could not be fused and only the first one is used.
    pub degraded: Option<QcError>,
}

/// Fuses same-type layers.
#[derive(Debug, Clone, Copy)]
pub struct LayerFusion {
    limit: usize,
}

impl Default for LayerFusion {
    fn default() -> Self {
        Self {
            limit: MAX_FUSED_LAYERS,
        }
    }
}

impl LayerFusion {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 || limit > MAX_FUSED_LAYERS {
            return Err(QcError::configuration(format!(
                "fusion limit must be between 1 and {}, got {}",
                MAX_FUSED_LAYERS, limit
            )));
        }
        Ok(Self { limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Fuse `layers` into one dataset.
    ///
    /// The first layer is the reference: every other layer must match its
    /// field names and types, geometry type and coordinate system.
    pub fn fuse(&self, layers: &[Arc<Layer>]) -> Result<FusedDataset> {
        self.check_count(layers.len())?;
        let reference = &layers[0];
        let mut dataset = FusedDataset::from_layer(reference);

        for layer in &layers[1..] {
            check_compatible(reference, layer)?;
            dataset.features.extend(layer.features.iter().map(|f| {
                let mut tagged = f.clone();
                tagged.source_layer = Some(layer.id.clone());
                tagged
            }));
            dataset.sources.push(layer.id.clone());
        }

        if dataset.is_multi_source() {
            dataset.id = LayerId::new(
                dataset
                    .sources
                    .iter()
                    .map(LayerId::as_str)
                    .collect::<Vec<_>>()
                    .join("+"),
            );
        }

        debug!(
            sources = dataset.sources.len(),
            features = dataset.len(),
            "layers fused"
        );
        Ok(dataset)
    }

    /// Fuse, falling back to the first layer alone on incompatibility.
    ///
    /// Count errors are still fatal; only `Compatibility` degrades.
    pub fn fuse_or_fallback(&self, layers: &[Arc<Layer>]) -> Result<FusionOutcome> {
        match self.fuse(layers) {
            Ok(dataset) => Ok(FusionOutcome {
                dataset,
                degraded: None,
            }),
            Err(err @ QcError::Compatibility { .. }) => {
                warn!(
                    error = %err,
                    layer = %layers[0].id,
                    "fusion failed, analysing the first layer only"
                );
                Ok(FusionOutcome {
                    dataset: FusedDataset::from_layer(&layers[0]),
                    degraded: Some(err),
                })
            }
            Err(err) => Err(err),
        }
    }

    fn check_count(&self, count: usize) -> Result<()> {
        if count == 0 {
            return Err(QcError::configuration("no layer selected"));
        }
        if count > self.limit {
            return Err(QcError::configuration(format!(
                "{} layers selected, at most {} can be analysed together",
                count, self.limit
            )));
        }
        Ok(())
    }
}

fn check_compatible(reference: &Layer, layer: &Layer) -> Result<()> {
    let mismatch = |reason: String| QcError::Compatibility {
        layer: layer.id.clone(),
        reference: reference.id.clone(),
        reason,
    };

    if layer.geometry_type != reference.geometry_type {
        return Err(mismatch(format!(
            "geometry type {} differs from {}",
            layer.geometry_type, reference.geometry_type
        )));
    }
    if layer.crs != reference.crs {
        return Err(mismatch(format!(
            "coordinate system {} differs from {}",
            layer.crs, reference.crs
        )));
    }
    if layer.schema != reference.schema {
        let missing: Vec<&str> = reference
            .schema
            .keys()
            .filter(|k| !layer.schema.contains_key(*k))
            .map(String::as_str)
            .collect();
        let extra: Vec<&str> = layer
            .schema
            .keys()
            .filter(|k| !reference.schema.contains_key(*k))
            .map(String::as_str)
            .collect();
        let reason = if missing.is_empty() && extra.is_empty() {
            "field types differ".to_string()
        } else {
            format!(
                "field sets differ (missing: [{}], extra: [{}])",
                missing.join(", "),
                extra.join(", ")
            )
        };
        return Err(mismatch(reason));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FieldType, Geometry};
    use pretty_assertions::assert_eq;

    fn parcels(id: &str, count: usize) -> Arc<Layer> {
        let crs = Crs::new("EPSG:2154");
        let mut layer = Layer::new(id, GeometryType::Polygon, crs.clone())
            .with_field("parcel_id", FieldType::Text);
        for i in 0..count {
            let x = i as f64 * 20.0;
            layer = layer.with_feature(
                Feature::new(i as u64, Geometry::rect((x, 0.0), (x + 10.0, 10.0), crs.clone()))
                    .with_attribute("parcel_id", format!("P{}", i).as_str()),
            );
        }
        Arc::new(layer)
    }

    #[test]
    fn test_fuse_preserves_counts_and_tags() {
        let layers = vec![parcels("a", 2), parcels("b", 3), parcels("c", 1)];
        let fused = LayerFusion::default().fuse(&layers).unwrap();

        assert_eq!(fused.len(), 6);
        assert_eq!(fused.sources.len(), 3);
        assert_eq!(fused.features_from(&LayerId::from("b")).count(), 3);
        assert!(fused.features.iter().all(|f| f.source_layer.is_some()));
        assert_eq!(fused.id, LayerId::from("a+b+c"));
    }

    #[test]
    fn test_single_layer_passes_through() {
        let fused = LayerFusion::default().fuse(&[parcels("a", 2)]).unwrap();
        assert_eq!(fused.id, LayerId::from("a"));
        assert!(!fused.is_multi_source());
        assert_eq!(fused.len(), 2);
    }

    #[test]
    fn test_too_many_layers_is_configuration_error() {
        let layers: Vec<_> = (0..5).map(|i| parcels(&format!("l{}", i), 1)).collect();
        let err = LayerFusion::default().fuse(&layers).unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION");
    }

    #[test]
    fn test_limit_above_cap_is_rejected() {
        assert!(LayerFusion::new(5).is_err());
        assert_eq!(LayerFusion::new(2).unwrap().limit(), 2);
    }

    #[test]
    fn test_schema_mismatch_names_layer() {
        let odd = Arc::new(
            Layer::new("odd", GeometryType::Polygon, Crs::new("EPSG:2154"))
                .with_field("lot", FieldType::Integer),
        );
        let err = LayerFusion::default()
            .fuse(&[parcels("a", 1), odd])
            .unwrap_err();
        match err {
            QcError::Compatibility { layer, .. } => assert_eq!(layer, LayerId::from("odd")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallback_uses_first_layer() {
        let other_crs = Arc::new(
            Layer::new("b", GeometryType::Polygon, Crs::new("EPSG:4326"))
                .with_field("parcel_id", FieldType::Text),
        );
        let outcome = LayerFusion::default()
            .fuse_or_fallback(&[parcels("a", 2), other_crs])
            .unwrap();

        assert!(outcome.degraded.is_some());
        assert_eq!(outcome.dataset.sources, vec![LayerId::from("a")]);
        assert_eq!(outcome.dataset.len(), 2);
    }
}
