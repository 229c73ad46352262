//! Import command - loads the source file into the table

use std::path::PathBuf;

use clap::Args;
use tracing::info;

use crate::cli::bootstrap::bootstrap;
use crate::infrastructure::subscriber::load_subscribers;

/// Arguments for the import command
#[derive(Args, Clone, Debug, Default)]
pub struct ImportArgs {
    /// JSON file to import (defaults to import.source_path)
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

/// Run the import command
pub async fn run(args: ImportArgs) -> anyhow::Result<()> {
    let (config, service) = bootstrap(true).await?;

    let path = args
        .file
        .unwrap_or_else(|| PathBuf::from(&config.import.source_path));
    info!(path = %path.display(), "Importing subscribers");

    let subscribers = load_subscribers(&path).await?;
    let report = service.import(&subscribers).await?;

    println!(
        "Imported {} subscriber(s), skipped {} duplicate(s)",
        report.imported, report.duplicates
    );

    Ok(())
}
