//! Manifest lookup and route listing.

use anyhow::{bail, Context, Result};
use std::path::Path;
use testimap_core::{transcript_routes, Config, ManifestKind, ManifestReader};

fn reader_for(config_path: &Path) -> Result<ManifestReader> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let client = reqwest::Client::builder()
        .user_agent(concat!("testimap/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    Ok(ManifestReader::new(config.manifest_sources(&client)))
}

/// Print the first reachable manifest of the given kind as JSON
pub async fn show_manifest(config_path: &Path, kind: ManifestKind) -> Result<()> {
    let reader = reader_for(config_path)?;

    let json = match kind {
        ManifestKind::Full => reader
            .load_full()
            .await
            .map(|m| serde_json::to_string_pretty(&m))
            .transpose()?,
        ManifestKind::Summary => reader
            .load_summary()
            .await
            .map(|m| serde_json::to_string_pretty(&m))
            .transpose()?,
    };

    match json {
        Some(json) => {
            println!("{}", json);
            Ok(())
        }
        None => bail!("No {} manifest found in any configured source", kind.as_str()),
    }
}

/// Print one `/transcripts/<slug>` route per line
pub async fn list_routes(config_path: &Path) -> Result<()> {
    let reader = reader_for(config_path)?;
    let manifest = reader.load_full().await;

    for route in transcript_routes(manifest.as_ref()) {
        println!("{}", route);
    }

    Ok(())
}
