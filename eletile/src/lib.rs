//! # eletile - Elevation Lookups from DEM Tiles
//!
//! Library for querying ground elevation from a directory of 1° × 1° GeoTIFF
//! elevation tiles, such as the ASTER GDEM v2 tiles (`ASTGTM2_N47E010_dem.tif`).
//!
//! ## Features
//!
//! - **Bilinear interpolation** between the four cell centers around a point
//! - **Bounded cache**: decoded tiles are kept in a size-bounded cache shared
//!   by all threads, and each tile is loaded at most once at a time
//! - **Missing tile tracking**: tiles that could not be loaded are remembered,
//!   never retried, and summarized in a report with a suggested download region
//! - **Zipped tiles**: `<tile>.zip` archives next to the tiles are extracted on
//!   first use
//! - **Auto-download** (optional `download` feature)
//!
//! ## Quick Start
//!
//! ```no_run
//! use eletile::{ElevationEngine, ElevationResult};
//!
//! let engine = ElevationEngine::new("/data/aster")?;
//!
//! if let ElevationResult::Value(ele) = engine.lookup(35.3606, 138.7274) {
//!     println!("Mount Fuji: {ele:.0}m");
//! }
//!
//! print!("{}", engine.missing_tiles_report());
//! # Ok::<(), eletile::TileError>(())
//! ```
//!
//! ## Tile Format
//!
//! Each tile is a single-band GeoTIFF covering one whole degree of latitude
//! and longitude. Tiles are georeferenced with either a model tie point and
//! pixel scale or a model transformation; samples may be 8 or 16 bit
//! integers or 32/64 bit floats. Cells equal to the declared nodata value
//! (`-9999` by default) are treated as voids.
//!
//! ## Data Sources
//!
//! ASTER GDEM tiles can be downloaded from:
//! - <https://search.earthdata.nasa.gov/>
//! - <https://gdemdl.aster.jspacesystems.or.jp/>

pub mod cache;
#[cfg(feature = "download")]
pub mod download;
pub mod engine;
pub mod error;
pub mod filename;
pub mod missing;
pub mod raster;
pub mod sampler;
pub mod source;
pub mod tagging;

#[cfg(test)]
mod testing;

// Re-export main types at crate root for convenience
pub use cache::{CacheStats, TileCache, DEFAULT_CACHE_SIZE};
pub use engine::{ElevationEngine, ElevationEngineBuilder, ElevationResult};
pub use error::{Result, TileError, Unavailable};
pub use filename::{TileKey, TileNaming};
pub use missing::{MissingTile, MissingTileRegistry, MissingTilesReport};
pub use raster::{GeoTiffReader, GeoTransform, RasterReader, RasterTile, DEFAULT_NO_DATA};
pub use source::{LocalDirectory, LocalTile, TileSource};
pub use tagging::{TagAction, TagPolicy};

#[cfg(feature = "download")]
pub use download::{Compression, DownloadConfig, Downloader};
#[cfg(feature = "download")]
pub use source::DownloadingSource;
