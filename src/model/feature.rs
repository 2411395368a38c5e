//! Features, attribute values and stable feature identities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::geometry::Geometry;
use super::layer::LayerId;

/// Feature identifier as delivered by the layer provider.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(String);

impl FeatureId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FeatureId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for FeatureId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for FeatureId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Attribute value of a feature field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl AttributeValue {
    /// Text form used to match ids and groups across layers.
    ///
    /// `12`, `12.0` and `"12"` all map to `"12"`; null has no key.
    pub fn as_key(&self) -> Option<String> {
        match self {
            AttributeValue::Null => None,
            AttributeValue::Bool(b) => Some(b.to_string()),
            AttributeValue::Int(i) => Some(i.to_string()),
            // 2^63 is not an i64; larger integral floats keep their own text form.
            AttributeValue::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
                Some(format!("{}", *f as i64))
            }
            AttributeValue::Float(f) => Some(f.to_string()),
            AttributeValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            }
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Text(value.to_string())
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// A single feature of a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub geometry: Geometry,
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,
    /// Origin layer, set when the feature lives in a fused dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_layer: Option<LayerId>,
}

impl Feature {
    pub fn new(id: impl Into<FeatureId>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            attributes: BTreeMap::new(),
            source_layer: None,
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Matching key of an attribute, `None` when absent or null.
    pub fn attribute_key(&self, name: &str) -> Option<String> {
        self.attribute(name).and_then(AttributeValue::as_key)
    }

    /// Identity of this feature, attributed to its origin layer when tagged.
    pub fn key(&self, layer: &LayerId) -> FeatureKey {
        FeatureKey {
            layer: self.source_layer.clone().unwrap_or_else(|| layer.clone()),
            feature: self.id.clone(),
        }
    }
}

/// Stable identity of a feature in its origin layer.
///
/// Ordering is lexicographic on (layer, feature) and decides which side of a
/// pair is reported first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FeatureKey {
    pub layer: LayerId,
    pub feature: FeatureId,
}

impl FeatureKey {
    pub fn new(layer: impl Into<LayerId>, feature: impl Into<FeatureId>) -> Self {
        Self {
            layer: layer.into(),
            feature: feature.into(),
        }
    }
}

impl fmt::Display for FeatureKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.layer, self.feature)
    }
}
