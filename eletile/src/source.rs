//! Tile acquisition.
//!
//! A [`TileSource`] turns a [`TileKey`] into a path the raster reader can
//! open. The default [`LocalDirectory`] looks for the tile in a data
//! directory, either as a plain file or inside a `.zip` archive next to it.
//! With the `download` feature, [`DownloadingSource`] falls back to fetching
//! missing tiles over HTTP.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use zip::ZipArchive;

use crate::error::{Result, TileError};
use crate::filename::{TileKey, TileNaming};

#[cfg(feature = "download")]
use crate::download::{DownloadConfig, Downloader};

/// Produces a readable file for a tile key, or reports it unavailable.
pub trait TileSource: Send + Sync {
    fn locate(&self, key: &TileKey) -> Result<PathBuf>;
}

/// A tile found in a data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTile {
    /// Tile filename (archives are listed under the name of the tile they hold).
    pub name: String,
    pub lower_left_lat: i32,
    pub lower_left_lon: i32,
    pub path: PathBuf,
    /// `true` if the tile is only available inside a `.zip` archive.
    pub zipped: bool,
}

/// Tiles stored in a local directory.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    dir: PathBuf,
}

impl LocalDirectory {
    /// Use `dir` as the tile directory.
    ///
    /// Fails with [`TileError::InvalidDataDir`] if `dir` is not an existing
    /// directory.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(TileError::InvalidDataDir { path: dir });
        }
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Archive names that may hold `key`: `<key>.zip` and `<stem>.zip`.
    fn archive_candidates(&self, key: &TileKey) -> Vec<PathBuf> {
        let mut candidates = vec![self.dir.join(format!("{key}.zip"))];
        if let Some(stem) = Path::new(key.as_str()).file_stem() {
            let mut name = stem.to_os_string();
            name.push(".zip");
            candidates.push(self.dir.join(name));
        }
        candidates
    }

    /// List the tiles in the directory that follow `naming`, sorted by name.
    ///
    /// A tile present both as a plain file and inside an archive is listed
    /// once, as the plain file.
    pub fn scan(&self, naming: &TileNaming) -> Result<Vec<LocalTile>> {
        let extension = format!(".{}", naming.extension());
        let mut tiles: BTreeMap<String, LocalTile> = BTreeMap::new();

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let (name, zipped) = match strip_suffix_ignore_case(file_name, ".zip") {
                Some(inner) if inner.ends_with(&extension) => (inner.to_string(), true),
                Some(inner) => (format!("{inner}{extension}"), true),
                None => (file_name.to_string(), false),
            };
            let Some((lat, lon)) = naming.parse(&name) else {
                continue;
            };
            if !name.ends_with(&extension) {
                continue;
            }

            let tile = LocalTile {
                name: name.clone(),
                lower_left_lat: lat,
                lower_left_lon: lon,
                path,
                zipped,
            };
            let plain_already_listed = tiles.get(&name).is_some_and(|t| !t.zipped);
            if !plain_already_listed {
                tiles.insert(name, tile);
            }
        }

        Ok(tiles.into_values().collect())
    }
}

impl TileSource for LocalDirectory {
    fn locate(&self, key: &TileKey) -> Result<PathBuf> {
        let path = self.dir.join(key.as_str());
        if path.is_file() {
            return Ok(path);
        }

        for archive in self.archive_candidates(key) {
            if archive.is_file() {
                tracing::debug!(key = %key, archive = %archive.display(), "extracting tile from archive");
                let contents = extract_tile_from_zip(File::open(&archive)?, &archive, key)?;
                write_atomically(&path, &contents)?;
                return Ok(path);
            }
        }

        Err(TileError::FileNotFound { path })
    }
}

/// Local directory first, then download into it.
#[cfg(feature = "download")]
pub struct DownloadingSource {
    local: LocalDirectory,
    downloader: Downloader,
}

#[cfg(feature = "download")]
impl DownloadingSource {
    /// Download into `dir`, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>, naming: TileNaming, config: DownloadConfig) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            local: LocalDirectory::new(dir)?,
            downloader: Downloader::new(config, naming)?,
        })
    }
}

#[cfg(feature = "download")]
impl TileSource for DownloadingSource {
    fn locate(&self, key: &TileKey) -> Result<PathBuf> {
        match self.local.locate(key) {
            Err(TileError::FileNotFound { .. }) => self.downloader.download(key, self.local.dir()),
            other => other,
        }
    }
}

/// Read the raster for `key` out of a ZIP archive.
///
/// Prefers an entry whose file name is exactly the key, otherwise takes the
/// first entry with the key's extension.
pub(crate) fn extract_tile_from_zip<R: Read + Seek>(
    reader: R,
    archive_path: &Path,
    key: &TileKey,
) -> Result<Vec<u8>> {
    let zip_error = |reason: String| TileError::Zip {
        path: archive_path.to_path_buf(),
        reason,
    };

    let mut archive =
        ZipArchive::new(reader).map_err(|e| zip_error(format!("failed to read archive: {e}")))?;

    let extension = Path::new(key.as_str())
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default();

    let mut fallback = None;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| zip_error(format!("failed to read entry: {e}")))?;
        let entry_name = entry.name().rsplit('/').next().unwrap_or_default();

        if entry_name.eq_ignore_ascii_case(key.as_str()) {
            fallback = Some(i);
            break;
        }
        if fallback.is_none()
            && !extension.is_empty()
            && entry_name.to_lowercase().ends_with(&extension)
        {
            fallback = Some(i);
        }
    }

    let index = fallback.ok_or_else(|| zip_error(format!("no entry for {key}")))?;
    let mut entry = archive
        .by_index(index)
        .map_err(|e| zip_error(format!("failed to read entry: {e}")))?;
    let mut contents = Vec::new();
    entry
        .read_to_end(&mut contents)
        .map_err(|e| zip_error(format!("failed to extract {key}: {e}")))?;
    Ok(contents)
}

/// Extract a tile from an in-memory archive.
#[cfg(feature = "download")]
pub(crate) fn extract_tile_from_zip_bytes(data: &[u8], key: &TileKey) -> Result<Vec<u8>> {
    extract_tile_from_zip(std::io::Cursor::new(data), Path::new(key.as_str()), key)
}

/// Write through a sibling `.part` file so readers never see a partial tile.
pub(crate) fn write_atomically(path: &Path, contents: &[u8]) -> Result<()> {
    let mut part = path.as_os_str().to_os_string();
    part.push(".part");
    let part = PathBuf::from(part);

    fs::write(&part, contents)?;
    fs::rename(&part, path)?;
    Ok(())
}

fn strip_suffix_ignore_case<'a>(name: &'a str, suffix: &str) -> Option<&'a str> {
    let split = name.len().checked_sub(suffix.len())?;
    if name.is_char_boundary(split) && name[split..].eq_ignore_ascii_case(suffix) {
        Some(&name[..split])
    } else {
        None
    }
}
