//! Data Model
//!
//! Geometries, features and layers as delivered by the layer provider.

mod feature;
mod geometry;
mod layer;

pub use feature::{AttributeValue, Feature, FeatureId, FeatureKey};
pub use geometry::{Crs, Geometry, GeometryType, Shape, Validity};
pub use layer::{FieldSchema, FieldType, Layer, LayerId};
