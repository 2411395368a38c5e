//! Geometry validation and exact predicates.

mod normalizer;
pub mod predicates;

pub use normalizer::{GeometryNormalizer, InvalidReason, NormalizedFeatures};
