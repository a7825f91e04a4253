//! Build command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use testimap_core::{Config, ManifestBuilder};

/// Build manifests and HTML fragments from the configured source directory
pub fn build_transcripts(config_path: &Path) -> Result<()> {
    tracing::info!("Loading config from {:?}", config_path);
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let source_dir = config.source_dir();

    let builder = ManifestBuilder::new(config);
    let Some(report) = builder.build().context("Failed to build transcripts")? else {
        println!("No transcripts found in {}", source_dir.display());
        return Ok(());
    };

    println!("✓ Processed {} transcripts", report.manifest.total);
    println!("  Full manifest: {}", report.manifest_path.display());
    println!("  Summary manifest: {}", report.summary_path.display());

    Ok(())
}
