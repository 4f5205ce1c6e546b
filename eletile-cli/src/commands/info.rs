use anyhow::{bail, Context, Result};
use eletile::{GeoTiffReader, LocalDirectory, RasterReader, TileKey, TileNaming, TileSource};
use std::path::{Path, PathBuf};

use super::{format_coverage, format_size};
use crate::EngineArgs;

pub fn run(args: &EngineArgs, tile: Option<String>, lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let naming = args.naming();
    let tile_path = match (tile, lat, lon) {
        (_, Some(lat), Some(lon)) => locate_in_data_dir(args, &naming, &naming.filename(lat, lon))?,
        (Some(tile), _, _) if Path::new(&tile).is_file() => PathBuf::from(tile),
        (Some(tile), _, _) => {
            let filename = with_extension(&tile, naming.extension());
            locate_in_data_dir(args, &naming, &filename)?
        }
        _ => bail!("Specify a tile path, a tile name, or --lat and --lon"),
    };

    let filename = tile_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let raster = GeoTiffReader::new()
        .load(&tile_path)
        .with_context(|| format!("Failed to load tile {}", tile_path.display()))?;
    let file_size = std::fs::metadata(&tile_path)?.len();

    let (west, south, east, north) = raster.bounds();
    let (x_res, y_res) = raster.transform().resolution();
    let total_samples = raster.width() * raster.height();

    // Display information
    println!("Tile: {}", filename);
    println!("Path: {}", tile_path.display());
    println!();
    println!("Size: {}x{} samples", raster.width(), raster.height());
    println!(
        "Resolution: {:.6}° x {:.6}° (~{:.1}\" x {:.1}\")",
        x_res.abs(),
        y_res.abs(),
        x_res.abs() * 3600.0,
        y_res.abs() * 3600.0
    );
    println!("Bounds: W {:.6}, S {:.6}, E {:.6}, N {:.6}", west, south, east, north);
    if let Some((lat, lon)) = naming.parse(&filename) {
        println!("Coverage: {}", format_coverage(lat, lon));
    }
    println!("Transform: {:?}", raster.transform().coefficients());
    println!("Nodata: {}", raster.no_data());
    println!("File size: {}", format_size(file_size));
    println!();

    if let Some((min, max)) = raster.min_max() {
        println!("Min elevation: {:.2}m", min);
        println!("Max elevation: {:.2}m", max);
    }

    let void_count = raster.void_count();
    if void_count > 0 {
        let void_pct = (void_count as f64 / total_samples as f64) * 100.0;
        println!("Void samples: {} ({:.1}%)", void_count, void_pct);
    }

    Ok(())
}

/// Path of `filename` in the data directory, extracting it from its archive
/// if it is only available zipped.
fn locate_in_data_dir(args: &EngineArgs, naming: &TileNaming, filename: &str) -> Result<PathBuf> {
    let dir = args.data_dir()?;
    let Some((lat, lon)) = naming.parse(filename) else {
        return Ok(dir.join(filename));
    };

    let source = LocalDirectory::new(&dir).context("Invalid data directory")?;
    source
        .locate(&TileKey::new(filename, lat, lon))
        .with_context(|| format!("Tile not found: {}", dir.join(filename).display()))
}

fn with_extension(name: &str, extension: &str) -> String {
    if Path::new(name).extension().is_some() {
        name.to_string()
    } else {
        format!("{}.{}", name, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_extension() {
        assert_eq!(
            with_extension("ASTGTM2_N47E010_dem", "tif"),
            "ASTGTM2_N47E010_dem.tif"
        );
        assert_eq!(
            with_extension("ASTGTM2_N47E010_dem.tif", "tif"),
            "ASTGTM2_N47E010_dem.tif"
        );
    }
}
