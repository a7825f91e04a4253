//! Map-config generation command.

use anyhow::{Context, Result};
use std::path::Path;
use testimap_core::mapconfig::{generate_map_config, DirectoryTileSource};

pub fn map_config(input: &Path, tiles: &Path, output: &Path) -> Result<()> {
    let source = DirectoryTileSource::new(tiles);
    generate_map_config(input, &source, output)
        .with_context(|| format!("Failed to generate map config from {:?}", tiles))?;

    println!("Updated config written to {}", output.display());
    Ok(())
}
