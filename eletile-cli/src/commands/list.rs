use anyhow::{Context, Result};
use eletile::LocalDirectory;
use std::fs;

use super::{format_coverage, format_size};
use crate::EngineArgs;

pub fn run(args: &EngineArgs) -> Result<()> {
    let dir = args.data_dir()?;

    if !dir.exists() {
        anyhow::bail!("Data directory does not exist: {}", dir.display());
    }

    let naming = args.naming();
    let tiles = LocalDirectory::new(&dir)
        .context("Invalid data directory")?
        .scan(&naming)
        .context("Failed to read data directory")?;

    if tiles.is_empty() {
        println!(
            "No {}*{}.{} tiles found in: {}",
            naming.prefix(),
            naming.suffix(),
            naming.extension(),
            dir.display()
        );
        return Ok(());
    }

    let name_width = tiles.iter().map(|t| t.name.len()).max().unwrap_or(4).max(4);
    let mut zipped_count = 0;
    let mut total_size: u64 = 0;

    println!(
        "{:<width$} {:>8} {:>28}",
        "TILE",
        "STORED",
        "COVERAGE",
        width = name_width
    );
    println!("{}", "-".repeat(name_width + 38));

    for tile in &tiles {
        total_size += fs::metadata(&tile.path).map(|m| m.len()).unwrap_or(0);
        let stored = if tile.zipped {
            zipped_count += 1;
            "zip"
        } else {
            "plain"
        };

        println!(
            "{:<width$} {:>8} {:>28}",
            tile.name,
            stored,
            format_coverage(tile.lower_left_lat, tile.lower_left_lon),
            width = name_width
        );
    }

    // Summary
    println!();
    println!("Summary:");
    println!("  Total tiles: {}", tiles.len());
    if zipped_count > 0 {
        println!("  Zipped: {}", zipped_count);
    }
    println!("  Total size: {}", format_size(total_size));
    println!("  Data directory: {}", dir.display());

    Ok(())
}
