//! Elevation lookups over a library of 1° tiles.
//!
//! [`ElevationEngine`] is the entry point of the library. It derives the tile
//! key for a coordinate, resolves the tile through the [`TileCache`], and
//! interpolates the elevation. Lookups never fail: every outcome is an
//! [`ElevationResult`], and tiles that could not be loaded are collected for
//! a [`MissingTilesReport`] at the end of a run.
//!
//! ```no_run
//! use eletile::{ElevationEngine, ElevationResult};
//!
//! let engine = ElevationEngine::builder("/data/aster")
//!     .cache_size(50)
//!     .build()?;
//!
//! match engine.lookup(47.2692, 11.4041) {
//!     ElevationResult::Value(ele) => println!("Innsbruck: {ele:.1}m"),
//!     ElevationResult::Void => println!("no data at this point"),
//!     ElevationResult::Missing => println!("tile not available"),
//! }
//!
//! print!("{}", engine.missing_tiles_report());
//! # Ok::<(), eletile::TileError>(())
//! ```
//!
//! # Auto-Download
//!
//! With the `download` feature, missing tiles can be fetched into the data
//! directory:
//!
//! ```ignore
//! use eletile::{ElevationEngine, download::DownloadConfig};
//!
//! let engine = ElevationEngine::builder("/data/aster")
//!     .auto_download(
//!         DownloadConfig::with_url_template("https://example.com/aster/{filename}.zip")
//!             .with_basic_auth("user", "password"),
//!     )
//!     .build()?;
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::{CacheStats, TileCache, DEFAULT_CACHE_SIZE};
use crate::error::{Result, TileError, Unavailable};
use crate::filename::{TileNaming, DEFAULT_EXTENSION, DEFAULT_PREFIX, DEFAULT_SUFFIX};
use crate::missing::{MissingTile, MissingTileRegistry, MissingTilesReport};
use crate::raster::{GeoTiffReader, RasterReader, RasterTile};
use crate::sampler;
use crate::source::{LocalDirectory, TileSource};

#[cfg(feature = "download")]
use crate::download::{Compression, DownloadConfig};
#[cfg(feature = "download")]
use crate::source::DownloadingSource;

/// Outcome of an elevation lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElevationResult {
    /// Interpolated elevation in the tile's vertical unit (meters for ASTER).
    Value(f64),
    /// The tile exists, but there is no data around the point.
    Void,
    /// The tile could not be loaded.
    Missing,
}

impl ElevationResult {
    /// The elevation, if there is one.
    pub fn value(self) -> Option<f64> {
        match self {
            ElevationResult::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(self) -> bool {
        self == ElevationResult::Missing
    }
}

impl fmt::Display for ElevationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElevationResult::Value(v) => write!(f, "{v:.2}"),
            ElevationResult::Void => f.write_str("void"),
            ElevationResult::Missing => f.write_str("missing"),
        }
    }
}

/// Elevation lookups with tile caching and missing-tile tracking.
///
/// The engine is `Send + Sync`; share it between threads behind an `Arc`.
pub struct ElevationEngine {
    data_dir: PathBuf,
    naming: TileNaming,
    cache: TileCache,
}

impl ElevationEngine {
    /// Create an engine over a local tile directory with default settings.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::builder(data_dir).build()
    }

    /// Create a builder for more configuration options.
    pub fn builder<P: AsRef<Path>>(data_dir: P) -> ElevationEngineBuilder {
        ElevationEngineBuilder::new(data_dir)
    }

    /// Elevation at `(lat, lon)` in decimal degrees.
    ///
    /// Non-finite coordinates yield [`ElevationResult::Void`].
    pub fn lookup(&self, lat: f64, lon: f64) -> ElevationResult {
        if !lat.is_finite() || !lon.is_finite() {
            return ElevationResult::Void;
        }

        let key = self.naming.key_for(lat, lon);
        tracing::trace!(lat, lon, key = %key, "elevation lookup");

        let Ok(tile) = self.cache.resolve(&key) else {
            return ElevationResult::Missing;
        };
        match sampler::sample(&tile, lat, lon) {
            Some(v) => ElevationResult::Value(v),
            None => {
                tracing::debug!(lat, lon, key = %key, "void neighborhood");
                ElevationResult::Void
            }
        }
    }

    /// Look up a batch of `(lat, lon)` pairs, in order.
    pub fn lookup_many(&self, coords: &[(f64, f64)]) -> Vec<ElevationResult> {
        coords
            .iter()
            .map(|&(lat, lon)| self.lookup(lat, lon))
            .collect()
    }

    /// The decoded tile covering `(lat, lon)`.
    pub fn tile_at(&self, lat: f64, lon: f64) -> std::result::Result<Arc<RasterTile>, Unavailable> {
        self.cache.resolve(&self.naming.key_for(lat, lon))
    }

    /// Report of every tile that was needed but could not be loaded so far.
    pub fn missing_tiles_report(&self) -> MissingTilesReport {
        self.cache.missing_registry().report()
    }

    /// Tiles recorded missing so far, ordered by key.
    pub fn missing_tiles(&self) -> Vec<MissingTile> {
        self.cache.missing_registry().tiles()
    }

    /// The registry failures are recorded in.
    pub fn missing_registry(&self) -> &Arc<MissingTileRegistry> {
        self.cache.missing_registry()
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Get the maximum cache size.
    pub fn cache_capacity(&self) -> u64 {
        self.cache.capacity()
    }

    /// Clear all tiles from the cache. Missing-tile records are kept.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn naming(&self) -> &TileNaming {
        &self.naming
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

/// Builder for [`ElevationEngine`].
///
/// ```no_run
/// use eletile::{ElevationEngineBuilder, TileNaming};
///
/// let engine = ElevationEngineBuilder::new("/data/aster")
///     .cache_size(20)
///     .naming(TileNaming::new("ASTGTM2_", "_dem", "tif"))
///     .build()?;
/// # Ok::<(), eletile::TileError>(())
/// ```
pub struct ElevationEngineBuilder {
    data_dir: PathBuf,
    cache_size: u64,
    naming: TileNaming,
    source: Option<Box<dyn TileSource>>,
    reader: Option<Box<dyn RasterReader>>,
    missing: Option<Arc<MissingTileRegistry>>,
    #[cfg(feature = "download")]
    download_config: Option<DownloadConfig>,
}

impl ElevationEngineBuilder {
    /// Create a new builder with the specified data directory.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            cache_size: DEFAULT_CACHE_SIZE,
            naming: TileNaming::default(),
            source: None,
            reader: None,
            missing: None,
            #[cfg(feature = "download")]
            download_config: None,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// # Environment Variables
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ELETILE_DATA_DIR` | Directory containing tiles | Required |
    /// | `ELETILE_CACHE_SIZE` | Maximum tiles in cache | 100 |
    /// | `ELETILE_TILE_PREFIX` | Filename prefix | `ASTGTM2_` |
    /// | `ELETILE_TILE_SUFFIX` | Filename suffix | `_dem` |
    /// | `ELETILE_TILE_EXTENSION` | Filename extension | `tif` |
    /// | `ELETILE_DOWNLOAD_URL` | URL template for downloads* | None |
    /// | `ELETILE_DOWNLOAD_GZIP` | Whether the URL serves gzip files* | auto-detect |
    /// | `ELETILE_DOWNLOAD_USER` | HTTP basic auth user* | None |
    /// | `ELETILE_DOWNLOAD_PASSWORD` | HTTP basic auth password* | None |
    ///
    /// *Only used when the `download` feature is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if `ELETILE_DATA_DIR` is not set.
    pub fn from_env() -> Result<Self> {
        let data_dir = std::env::var("ELETILE_DATA_DIR").map_err(|_| {
            TileError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ELETILE_DATA_DIR environment variable not set",
            ))
        })?;

        let cache_size: u64 = std::env::var("ELETILE_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CACHE_SIZE);

        let env_or =
            |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        let naming = TileNaming::new(
            env_or("ELETILE_TILE_PREFIX", DEFAULT_PREFIX),
            env_or("ELETILE_TILE_SUFFIX", DEFAULT_SUFFIX),
            env_or("ELETILE_TILE_EXTENSION", DEFAULT_EXTENSION),
        );

        #[cfg(feature = "download")]
        let download_config = std::env::var("ELETILE_DOWNLOAD_URL").ok().map(|url_template| {
            // Explicit compression setting, otherwise auto-detect from URL
            let config = match std::env::var("ELETILE_DOWNLOAD_GZIP") {
                Ok(gzip) => {
                    let compression = if gzip.eq_ignore_ascii_case("true") || gzip == "1" {
                        Compression::Gzip
                    } else {
                        Compression::None
                    };
                    DownloadConfig::with_url_template_and_compression(url_template, compression)
                }
                Err(_) => DownloadConfig::with_url_template(url_template),
            };
            match (
                std::env::var("ELETILE_DOWNLOAD_USER"),
                std::env::var("ELETILE_DOWNLOAD_PASSWORD"),
            ) {
                (Ok(user), Ok(password)) => config.with_basic_auth(user, password),
                _ => config,
            }
        });

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            cache_size,
            naming,
            source: None,
            reader: None,
            missing: None,
            #[cfg(feature = "download")]
            download_config,
        })
    }

    /// Set the data directory.
    ///
    /// Overrides the directory set in the constructor or from environment.
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the maximum number of tiles to keep in cache.
    ///
    /// Default is 100 tiles.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    /// Set the tile naming scheme. Default is ASTER GDEM v2.
    pub fn naming(mut self, naming: TileNaming) -> Self {
        self.naming = naming;
        self
    }

    /// Acquire tiles through `source` instead of the data directory.
    pub fn tile_source(mut self, source: impl TileSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Decode tiles with `reader` instead of [`GeoTiffReader`].
    pub fn raster_reader(mut self, reader: impl RasterReader + 'static) -> Self {
        self.reader = Some(Box::new(reader));
        self
    }

    /// Record missing tiles in a registry owned by the caller.
    pub fn missing_registry(mut self, registry: Arc<MissingTileRegistry>) -> Self {
        self.missing = Some(registry);
        self
    }

    /// Enable auto-download with the specified configuration.
    ///
    /// Tiles not found in the data directory are downloaded into it. The
    /// directory is created if needed.
    #[cfg(feature = "download")]
    pub fn auto_download(mut self, config: DownloadConfig) -> Self {
        self.download_config = Some(config);
        self
    }

    /// Build the [`ElevationEngine`].
    ///
    /// # Errors
    ///
    /// Returns [`TileError::InvalidDataDir`] if the data directory is used as
    /// the tile source and is not a directory, or an error if the downloader
    /// cannot be created.
    pub fn build(mut self) -> Result<ElevationEngine> {
        let source = match self.source.take() {
            Some(source) => source,
            None => self.default_source()?,
        };
        let reader: Box<dyn RasterReader> = match self.reader {
            Some(reader) => reader,
            None => Box::new(GeoTiffReader::new()),
        };
        let missing = self.missing.unwrap_or_default();

        Ok(ElevationEngine {
            data_dir: self.data_dir,
            cache: TileCache::new(self.cache_size, source, reader, missing),
            naming: self.naming,
        })
    }

    #[cfg(feature = "download")]
    fn default_source(&self) -> Result<Box<dyn TileSource>> {
        match &self.download_config {
            Some(config) => Ok(Box::new(DownloadingSource::new(
                &self.data_dir,
                self.naming.clone(),
                config.clone(),
            )?)),
            None => Ok(Box::new(LocalDirectory::new(&self.data_dir)?)),
        }
    }

    #[cfg(not(feature = "download"))]
    fn default_source(&self) -> Result<Box<dyn TileSource>> {
        Ok(Box::new(LocalDirectory::new(&self.data_dir)?))
    }
}
