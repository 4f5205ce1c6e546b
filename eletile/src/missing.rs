//! Bookkeeping for tiles that were needed but could not be loaded.
//!
//! Every key the cache fails to load is recorded once in a
//! [`MissingTileRegistry`]. At the end of a run the registry renders a
//! [`MissingTilesReport`]: the list of missing tiles plus the smallest
//! rectangular region that covers all of them, which is what an operator
//! would download to fill the gaps in one go.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use crate::filename::{east_west, north_south, TileKey};

/// A tile that could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTile {
    pub key: TileKey,
    pub lower_left_lat: i32,
    pub lower_left_lon: i32,
}

impl MissingTile {
    fn new(key: &TileKey) -> Self {
        Self {
            key: key.clone(),
            lower_left_lat: key.lower_left_lat(),
            lower_left_lon: key.lower_left_lon(),
        }
    }
}

/// Thread-safe set of missing tiles, keyed by [`TileKey`].
///
/// Records are insert-if-absent and are never removed.
#[derive(Debug, Default)]
pub struct MissingTileRegistry {
    tiles: RwLock<BTreeMap<TileKey, MissingTile>>,
}

impl MissingTileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `key` as missing. Returns `true` if it was not recorded before.
    pub fn record(&self, key: &TileKey) -> bool {
        if self.contains(key) {
            return false;
        }

        let mut tiles = self.tiles.write().unwrap_or_else(PoisonError::into_inner);
        if tiles.contains_key(key) {
            return false;
        }
        tiles.insert(key.clone(), MissingTile::new(key));
        true
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tiles.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the recorded tiles, ordered by key.
    pub fn tiles(&self) -> Vec<MissingTile> {
        self.tiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Build a report from the current records.
    pub fn report(&self) -> MissingTilesReport {
        MissingTilesReport::new(self.tiles())
    }
}

/// Bounding box over the lower-left corners of the missing tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub min_lat: i32,
    pub max_lat: i32,
    pub min_lon: i32,
    pub max_lon: i32,
}

/// Rectangle of whole tiles to download, given by its north-west and
/// south-east corners.
///
/// Corners are `i64` since the north and east edges lie one degree past the
/// last tile corner, which need not fit an `i32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadRegion {
    pub north: i64,
    pub west: i64,
    pub south: i64,
    pub east: i64,
}

impl DownloadRegion {
    /// Number of 1 degree tiles inside the region.
    pub fn tile_count(&self) -> u64 {
        let rows = (self.north - self.south).unsigned_abs();
        let cols = (self.east - self.west).unsigned_abs();
        rows.saturating_mul(cols)
    }
}

impl fmt::Display for DownloadRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} to {}/{}",
            format_lat(self.north),
            format_lon(self.west),
            format_lat(self.south),
            format_lon(self.east)
        )
    }
}

/// Summary of the missing tiles at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingTilesReport {
    tiles: Vec<MissingTile>,
}

impl MissingTilesReport {
    pub fn new(tiles: Vec<MissingTile>) -> Self {
        Self { tiles }
    }

    pub fn tiles(&self) -> &[MissingTile] {
        &self.tiles
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// Extent of the lower-left corners, or `None` if nothing is missing.
    pub fn envelope(&self) -> Option<Envelope> {
        let first = self.tiles.first()?;
        let start = Envelope {
            min_lat: first.lower_left_lat,
            max_lat: first.lower_left_lat,
            min_lon: first.lower_left_lon,
            max_lon: first.lower_left_lon,
        };

        Some(self.tiles.iter().fold(start, |env, tile| Envelope {
            min_lat: env.min_lat.min(tile.lower_left_lat),
            max_lat: env.max_lat.max(tile.lower_left_lat),
            min_lon: env.min_lon.min(tile.lower_left_lon),
            max_lon: env.max_lon.max(tile.lower_left_lon),
        }))
    }

    /// Smallest region of whole tiles covering every missing tile.
    pub fn suggested_region(&self) -> Option<DownloadRegion> {
        self.envelope().map(|env| DownloadRegion {
            north: i64::from(env.max_lat) + 1,
            west: i64::from(env.min_lon),
            south: i64::from(env.min_lat),
            east: i64::from(env.max_lon) + 1,
        })
    }

    /// Tiles inside the suggested region that are not missing.
    pub fn unnecessary_tiles(&self) -> u64 {
        self.suggested_region()
            .map(|region| region.tile_count().saturating_sub(self.tiles.len() as u64))
            .unwrap_or(0)
    }
}

impl fmt::Display for MissingTilesReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(region) = self.suggested_region() else {
            return writeln!(f, "There are no missing tiles");
        };

        writeln!(f, "There are {} missing tiles:", self.tiles.len())?;
        for tile in &self.tiles {
            writeln!(
                f,
                "{}\t{}\t{}",
                tile.key,
                format_lat(i64::from(tile.lower_left_lat)),
                format_lon(i64::from(tile.lower_left_lon))
            )?;
        }
        writeln!(
            f,
            "If you want it simple, just download all tiles from {} ({} unnecessary tiles)",
            region,
            self.unnecessary_tiles()
        )
    }
}

fn format_lat(lat: i64) -> String {
    format!("{}{}", lat.unsigned_abs(), north_south(lat as f64))
}

fn format_lon(lon: i64) -> String {
    format!("{}{}", lon.unsigned_abs(), east_west(lon as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::TileNaming;
    use std::sync::Arc;
    use std::thread;

    fn key(lat: f64, lon: f64) -> TileKey {
        TileNaming::aster().key_for(lat, lon)
    }

    #[test]
    fn test_record_is_idempotent() {
        let registry = MissingTileRegistry::new();
        let k = key(47.5, 10.5);

        assert!(registry.is_empty());
        assert!(registry.record(&k));
        assert!(!registry.record(&k));
        assert!(registry.contains(&k));
        assert_eq!(registry.len(), 1);

        let tiles = registry.tiles();
        assert_eq!(tiles[0].lower_left_lat, 47);
        assert_eq!(tiles[0].lower_left_lon, 10);
    }

    #[test]
    fn test_concurrent_record_once() {
        let registry = Arc::new(MissingTileRegistry::new());
        let k = key(47.5, 10.5);

        let inserted: usize = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| registry.record(&k)))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });

        assert_eq!(inserted, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_report() {
        let report = MissingTileRegistry::new().report();
        assert!(report.is_empty());
        assert_eq!(report.envelope(), None);
        assert_eq!(report.suggested_region(), None);
        assert_eq!(report.unnecessary_tiles(), 0);
        assert_eq!(report.to_string(), "There are no missing tiles\n");
    }

    #[test]
    fn test_report_two_tiles() {
        let registry = MissingTileRegistry::new();
        registry.record(&key(47.5, 10.5));
        registry.record(&key(48.5, 11.5));

        let report = registry.report();
        assert_eq!(report.len(), 2);
        assert_eq!(
            report.envelope(),
            Some(Envelope {
                min_lat: 47,
                max_lat: 48,
                min_lon: 10,
                max_lon: 11,
            })
        );
        assert_eq!(
            report.suggested_region(),
            Some(DownloadRegion {
                north: 49,
                west: 10,
                south: 47,
                east: 12,
            })
        );
        assert_eq!(report.unnecessary_tiles(), 2);

        let text = report.to_string();
        assert!(text.starts_with("There are 2 missing tiles:\n"));
        assert!(text.contains("ASTGTM2_N47E010_dem.tif\t47N\t10E\n"));
        assert!(text.contains("ASTGTM2_N48E011_dem.tif\t48N\t11E\n"));
        assert!(text.contains("from 49N/10E to 47N/12E (2 unnecessary tiles)"));
    }

    #[test]
    fn test_report_southern_western_tiles() {
        let registry = MissingTileRegistry::new();
        registry.record(&key(-3.2, -70.9));
        registry.record(&key(-2.5, -69.5));

        let report = registry.report();
        assert_eq!(
            report.suggested_region(),
            Some(DownloadRegion {
                north: -2,
                west: -71,
                south: -4,
                east: -69,
            })
        );
        assert_eq!(report.unnecessary_tiles(), 2);

        let text = report.to_string();
        assert!(text.contains("ASTGTM2_S04W071_dem.tif\t4S\t71W\n"));
        assert!(text.contains("from 2S/71W to 4S/69W"));
    }

    #[test]
    fn test_single_tile_needs_nothing_extra() {
        let registry = MissingTileRegistry::new();
        registry.record(&key(47.5, 10.5));

        let report = registry.report();
        assert_eq!(report.unnecessary_tiles(), 0);
        assert!(report.to_string().contains("from 48N/10E to 47N/11E"));
    }

    #[test]
    fn test_report_extreme_coordinates() {
        let registry = MissingTileRegistry::new();
        registry.record(&key(1e10, 10.5));

        let report = registry.report();
        let region = report.suggested_region().unwrap();
        assert_eq!(region.north, i64::from(i32::MAX) + 1);
        assert_eq!(region.south, i64::from(i32::MAX));
        assert_eq!(report.unnecessary_tiles(), 0);
        assert!(report.to_string().contains("from 2147483648N/10E to 2147483647N/11E"));

        registry.record(&key(-1e10, -1e10));
        let report = registry.report();
        assert_eq!(report.suggested_region().unwrap().tile_count(), u64::MAX);
        assert_eq!(report.unnecessary_tiles(), u64::MAX - 2);
        assert!(report.to_string().contains("2147483648S"));
    }
}
