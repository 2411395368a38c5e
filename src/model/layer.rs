//! Layers as read from the layer provider.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::feature::{Feature, FeatureId};
use super::geometry::{Crs, GeometryType};

/// Layer identifier, unique within a dataset store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared type of a layer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Bool,
    Integer,
    Real,
    Text,
}

/// Field name to field type.
pub type FieldSchema = BTreeMap<String, FieldType>;

/// A vector layer.
///
/// Layers are owned by the caller and shared with the analysis as
/// `Arc<Layer>`; detection never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    #[serde(default)]
    pub name: String,
    pub geometry_type: GeometryType,
    #[serde(default)]
    pub crs: Crs,
    #[serde(default)]
    pub schema: FieldSchema,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl Layer {
    pub fn new(id: impl Into<LayerId>, geometry_type: GeometryType, crs: Crs) -> Self {
        let id = id.into();
        Self {
            name: id.to_string(),
            id,
            geometry_type,
            crs,
            schema: FieldSchema::new(),
            features: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.schema.insert(name.into(), field_type);
        self
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.schema.contains_key(name)
    }

    pub fn feature(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| &f.id == id)
    }

    pub fn position(&self, id: &FeatureId) -> Option<usize> {
        self.features.iter().position(|f| &f.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Geometry;

    #[test]
    fn test_layer_builder() {
        let layer = Layer::new("markers", GeometryType::Point, Crs::new("EPSG:2154"))
            .with_field("parcel_id", FieldType::Text)
            .with_feature(Feature::new("1", Geometry::point(0.0, 0.0, Crs::new("EPSG:2154"))));

        assert_eq!(layer.name, "markers");
        assert_eq!(layer.len(), 1);
        assert!(layer.has_field("parcel_id"));
        assert_eq!(layer.position(&FeatureId::from("1")), Some(0));
        assert!(layer.feature(&FeatureId::from("2")).is_none());
    }
}
