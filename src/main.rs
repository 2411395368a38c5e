//! Spatial QC CLI
//!
//! Command-line interface for analysing and correcting vector datasets.

use clap::Parser;
use tracing::info;

use spatial_qc::cli::commands::{self, AnalyzeOptions};
use spatial_qc::cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    spatial_qc::logging::init_logging(cli.verbose);

    info!("Spatial QC v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Some(cmd) => handle_command(cmd),
        None => {
            println!("Spatial QC v{}", env!("CARGO_PKG_VERSION"));
            println!("Use --help for available commands");
            Ok(())
        }
    }
}

fn handle_command(cmd: Commands) -> anyhow::Result<()> {
    match cmd {
        Commands::Analyze {
            dataset,
            config,
            profile,
            grouped,
            cadastral,
            layers,
            json,
            plan,
        } => commands::analyze(&AnalyzeOptions {
            dataset,
            config,
            profile,
            grouped,
            cadastral,
            layers,
            json,
            plan,
        }),
        Commands::Profiles => commands::profiles(),
        Commands::Correct {
            dataset,
            plan,
            output,
            repair,
        } => commands::correct(&dataset, &plan, output.as_deref(), &repair),
    }
}
