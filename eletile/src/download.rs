//! Tile download over HTTP.
//!
//! Only available with the `download` feature. Tiles are fetched from a
//! configurable URL template, optionally decompressed, and written into the
//! data directory under their key so later runs find them locally.
//!
//! # URL templates
//!
//! | Placeholder    | Value for `ASTGTM2_N47E010_dem.tif` |
//! |----------------|-------------------------------------|
//! | `{filename}`   | `ASTGTM2_N47E010_dem`               |
//! | `{key}`        | `ASTGTM2_N47E010_dem.tif`           |
//! | `{lat_prefix}` | `N`                                 |
//! | `{lat}`        | `47`                                |
//! | `{lon_prefix}` | `E`                                 |
//! | `{lon}`        | `010`                               |

use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;

use crate::error::{Result, TileError};
use crate::filename::{TileKey, TileNaming};
use crate::source::{extract_tile_from_zip_bytes, write_atomically};

/// Default timeout for HTTP requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of retries after a failed attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Compression format of downloaded files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// The response body is the raster itself.
    #[default]
    None,
    /// Gzip-compressed raster (`.gz`).
    Gzip,
    /// ZIP archive holding the raster (`.zip`).
    Zip,
}

impl Compression {
    /// Detect compression format from a URL or filename.
    ///
    /// # Examples
    ///
    /// ```
    /// use eletile::download::Compression;
    ///
    /// assert_eq!(Compression::from_url("file.tif.gz"), Compression::Gzip);
    /// assert_eq!(Compression::from_url("file.zip"), Compression::Zip);
    /// assert_eq!(Compression::from_url("file.tif"), Compression::None);
    /// ```
    pub fn from_url(url: &str) -> Self {
        let lower = url.to_lowercase();
        if lower.ends_with(".gz") {
            Compression::Gzip
        } else if lower.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::None
        }
    }
}

/// Configuration for downloading tiles.
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// URL template, see the module documentation for placeholders.
    pub url_template: String,
    /// Compression format of the downloaded file.
    pub compression: Compression,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Number of retry attempts on failure.
    pub max_retries: u32,
    /// HTTP basic credentials (NASA Earthdata, for instance).
    pub credentials: Option<(String, String)>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            url_template: String::new(),
            compression: Compression::None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            credentials: None,
        }
    }
}

impl DownloadConfig {
    /// Create a configuration from a URL template.
    ///
    /// Compression is auto-detected from the URL extension:
    /// - `.gz` → Gzip
    /// - `.zip` → ZIP
    /// - otherwise → None
    ///
    /// # Example
    ///
    /// ```
    /// use eletile::download::{Compression, DownloadConfig};
    ///
    /// let config = DownloadConfig::with_url_template(
    ///     "https://example.com/aster/{lat_prefix}{lat}/{filename}.zip",
    /// );
    /// assert_eq!(config.compression, Compression::Zip);
    /// ```
    pub fn with_url_template(url_template: impl Into<String>) -> Self {
        let url_template = url_template.into();
        let compression = Compression::from_url(&url_template);
        Self {
            url_template,
            compression,
            ..Default::default()
        }
    }

    /// Create a configuration with an explicit compression setting.
    pub fn with_url_template_and_compression(
        url_template: impl Into<String>,
        compression: Compression,
    ) -> Self {
        Self {
            url_template: url_template.into(),
            compression,
            ..Default::default()
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Authenticate with HTTP basic auth.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }
}

/// Tile downloader.
pub struct Downloader {
    client: Client,
    config: DownloadConfig,
    naming: TileNaming,
}

impl Downloader {
    /// Create a downloader for tiles named with `naming`.
    pub fn new(config: DownloadConfig, naming: TileNaming) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TileError::DownloadFailed {
                filename: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            config,
            naming,
        })
    }

    /// Download the tile for `key` into `dest_dir` and return its path.
    ///
    /// A tile already present in `dest_dir` is not downloaded again.
    pub fn download(&self, key: &TileKey, dest_dir: &Path) -> Result<PathBuf> {
        let dest_path = dest_dir.join(key.as_str());
        if dest_path.exists() {
            return Ok(dest_path);
        }

        let url = self.build_url(key)?;
        std::fs::create_dir_all(dest_dir)?;

        let mut last_error = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                std::thread::sleep(Duration::from_millis(500 * u64::from(attempt)));
            }

            match self.fetch(&url, key) {
                Ok(contents) => {
                    write_atomically(&dest_path, &contents)?;
                    tracing::info!(key = %key, url = %url, bytes = contents.len(), "downloaded tile");
                    return Ok(dest_path);
                }
                Err(e) => {
                    tracing::debug!(key = %key, attempt, error = %e, "download attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| TileError::DownloadFailed {
            filename: key.to_string(),
            reason: "Unknown error".to_string(),
        }))
    }

    /// Build the download URL for a tile.
    fn build_url(&self, key: &TileKey) -> Result<String> {
        let failed = |reason: &str| TileError::DownloadFailed {
            filename: key.to_string(),
            reason: reason.to_string(),
        };

        if self.config.url_template.is_empty() {
            return Err(failed("No download URL template configured"));
        }

        let (lat_prefix, lat, lon_prefix, lon) = self
            .cell_components(key)
            .ok_or_else(|| failed("Key does not follow the configured tile naming"))?;
        let stem = Path::new(key.as_str())
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(key.as_str());

        Ok(self
            .config
            .url_template
            .replace("{filename}", stem)
            .replace("{key}", key.as_str())
            .replace("{lat_prefix}", lat_prefix)
            .replace("{lat}", lat)
            .replace("{lon_prefix}", lon_prefix)
            .replace("{lon}", lon))
    }

    /// Split the `N47E010` part of a key into its components.
    fn cell_components<'k>(&self, key: &'k TileKey) -> Option<(&'k str, &'k str, &'k str, &'k str)> {
        let cell = key.as_str().strip_prefix(self.naming.prefix())?.get(..7)?;
        if !cell.is_ascii() {
            return None;
        }
        Some((&cell[0..1], &cell[1..3], &cell[3..4], &cell[4..7]))
    }

    /// Perform one download attempt and return the decompressed raster.
    fn fetch(&self, url: &str, key: &TileKey) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);
        if let Some((username, password)) = &self.config.credentials {
            request = request.basic_auth(username, Some(password));
        }

        let response = request.send()?;
        if !response.status().is_success() {
            return Err(TileError::DownloadFailed {
                filename: key.to_string(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response.bytes()?;
        decompress(&bytes, self.config.compression, key)
    }
}

/// Undo the transfer compression of a downloaded tile.
fn decompress(bytes: &[u8], compression: Compression, key: &TileKey) -> Result<Vec<u8>> {
    match compression {
        Compression::None => Ok(bytes.to_vec()),
        Compression::Gzip => {
            let mut decoder = GzDecoder::new(bytes);
            let mut data = Vec::new();
            decoder
                .read_to_end(&mut data)
                .map_err(|e| TileError::DownloadFailed {
                    filename: key.to_string(),
                    reason: format!("Failed to decompress gzip: {}", e),
                })?;
            Ok(data)
        }
        Compression::Zip => extract_tile_from_zip_bytes(bytes, key),
    }
}
