//! Basic example demonstrating eletile library usage.
//!
//! Run with: cargo run --example basic -- /path/to/aster/tiles

use eletile::{ElevationEngine, ElevationResult, TileError};
use std::env;

fn main() -> Result<(), TileError> {
    // Get data directory from command line
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/aster/tiles");
        std::process::exit(1);
    });

    // Create an engine with up to 10 cached tiles
    let engine = ElevationEngine::builder(&data_dir).cache_size(10).build()?;

    // Query some famous peaks
    let locations = [
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
        ("Zugspitze, Germany", 47.4211, 10.9853),
    ];

    println!("Elevation queries (bilinear):");
    println!("{:-<50}", "");

    for (name, lat, lon) in &locations {
        match engine.lookup(*lat, *lon) {
            ElevationResult::Value(elevation) => println!("{}: {:.1}m", name, elevation),
            ElevationResult::Void => println!("{}: no data around this point", name),
            ElevationResult::Missing => println!("{}: tile not available locally", name),
        }
    }

    // Show cache statistics
    let stats = engine.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    println!();
    print!("{}", engine.missing_tiles_report());

    Ok(())
}
