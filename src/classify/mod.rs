//! Severity classification and QC profiles.

mod profile;
mod severity;

pub use profile::{AreaBands, Bands, Profile};
pub use severity::classify;
