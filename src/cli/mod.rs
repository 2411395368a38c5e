//! CLI Module
//!
//! Command-line interface for spatial quality control.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Spatial QC - anomaly detection and correction for vector layers
#[derive(Parser, Debug)]
#[command(name = "spatial-qc")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyse the layers of a dataset file
    #[command(name = "analyze")]
    Analyze {
        /// Dataset JSON file ({"layers": [...]})
        dataset: PathBuf,

        /// Analysis configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Profile preset name (cadastre, construction, topography, hydrology)
        #[arg(short, long)]
        profile: Option<String>,

        /// Only compare points sharing the same value of this field
        #[arg(long, value_name = "FIELD")]
        grouped: Option<String>,

        /// Cadastral id fields, as POINT_FIELD:POLYGON_FIELD
        #[arg(long, value_name = "POINT_FIELD:POLYGON_FIELD")]
        cadastral: Option<String>,

        /// Analyse only these layer ids (default: all)
        #[arg(short, long = "layer")]
        layers: Vec<String>,

        /// Print records as JSON instead of a table
        #[arg(long)]
        json: bool,

        /// Write a correction plan for every correctable record
        #[arg(long, value_name = "PATH")]
        plan: Option<PathBuf>,
    },

    /// List the profile presets
    #[command(name = "profiles")]
    Profiles,

    /// Apply a correction plan and write the dataset with corrected layers
    #[command(name = "correct")]
    Correct {
        /// Dataset JSON file
        dataset: PathBuf,

        /// Correction plan JSON file
        plan: PathBuf,

        /// Output dataset file (default: print a summary only)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Repair strategy for polygons: trim or validity
        #[arg(long, default_value = "trim")]
        repair: String,
    },
}
