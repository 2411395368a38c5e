//! Analysis runs: configuration, control, orchestration and reports.

mod config;
mod control;
mod orchestrator;
mod report;

pub use config::{AnalysisConfig, ProfileChoice};
pub use control::{AnalysisEvent, RunControl};
pub use orchestrator::{run_analysis, spawn_analysis, AnalysisHandle};
pub use report::AnalysisReport;
