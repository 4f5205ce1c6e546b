//! Error types for the eletile library.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::filename::TileKey;

/// Errors that can occur while acquiring or decoding elevation tiles.
#[derive(Error, Debug)]
pub enum TileError {
    /// IO error when reading files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The TIFF container could not be decoded.
    #[error("TIFF decode error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// The raster decoded, but its contents are unusable.
    #[error("Invalid raster {path}: {reason}")]
    InvalidRaster { path: PathBuf, reason: String },

    /// The raster uses a layout this library does not read (e.g. several bands).
    #[error("Unsupported raster {path}: {reason}")]
    UnsupportedRaster { path: PathBuf, reason: String },

    /// The tile file was not found.
    #[error("Tile file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// The tile source could not provide the tile.
    #[error("Tile not available: {key}")]
    TileNotAvailable { key: String },

    /// The configured data directory is not usable.
    #[error("Not a directory: {path}")]
    InvalidDataDir { path: PathBuf },

    /// A `.zip` tile archive could not be read.
    #[error("ZIP archive error in {path}: {reason}")]
    Zip { path: PathBuf, reason: String },

    /// Failed to download a tile.
    #[cfg(feature = "download")]
    #[error("Failed to download {filename}: {reason}")]
    DownloadFailed { filename: String, reason: String },

    /// HTTP error while downloading.
    #[cfg(feature = "download")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using [`TileError`].
pub type Result<T> = std::result::Result<T, TileError>;

/// A tile could not be resolved and has been recorded as missing.
///
/// `cause` is `None` when the key was already known to be missing and no load
/// was attempted.
#[derive(Error, Debug, Clone)]
#[error("Tile {key} is unavailable")]
pub struct Unavailable {
    pub key: TileKey,
    #[source]
    pub cause: Option<Arc<TileError>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TileError::FileNotFound {
            path: PathBuf::from("ASTGTM2_N47E010_dem.tif"),
        };
        assert!(err.to_string().contains("ASTGTM2_N47E010_dem.tif"));

        let err = TileError::InvalidRaster {
            path: PathBuf::from("broken.tif"),
            reason: "no georeferencing".to_string(),
        };
        assert!(err.to_string().contains("broken.tif"));
        assert!(err.to_string().contains("no georeferencing"));

        let err = TileError::InvalidDataDir {
            path: PathBuf::from("/nowhere"),
        };
        assert!(err.to_string().contains("/nowhere"));
    }

    #[test]
    fn test_unavailable_source() {
        use std::error::Error as _;

        let key = TileKey::new("ASTGTM2_N47E010_dem.tif", 47, 10);
        let memoized = Unavailable {
            key: key.clone(),
            cause: None,
        };
        assert!(memoized.source().is_none());
        assert!(memoized.to_string().contains("ASTGTM2_N47E010_dem.tif"));

        let failed = Unavailable {
            key,
            cause: Some(Arc::new(TileError::TileNotAvailable {
                key: "ASTGTM2_N47E010_dem.tif".to_string(),
            })),
        };
        assert!(failed.source().is_some());
    }
}
