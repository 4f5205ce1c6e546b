//! Bounded tile cache with memoized misses.
//!
//! [`TileCache`] resolves a [`TileKey`] to a shared [`RasterTile`]. The first
//! request for a key asks the [`TileSource`] for a file and decodes it with
//! the [`RasterReader`]; later requests are served from memory until the tile
//! is evicted. A key that fails to load is recorded in the
//! [`MissingTileRegistry`] and is never attempted again.
//!
//! Concurrent requests for the same unseen key share a single load: one caller
//! runs it, the others wait and observe the same outcome. Requests for
//! different keys do not block each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::sync::Cache;

use crate::error::{TileError, Unavailable};
use crate::filename::TileKey;
use crate::missing::MissingTileRegistry;
use crate::raster::{RasterReader, RasterTile};
use crate::source::TileSource;

/// Default number of tiles kept in memory.
pub const DEFAULT_CACHE_SIZE: u64 = 100;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of requests served from the cache.
    pub hit_count: u64,
    /// Number of requests that were not in the cache.
    pub miss_count: u64,
    /// Number of load attempts (source lookup plus decode).
    pub load_count: u64,
    /// Number of distinct tiles recorded missing.
    pub missing_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// Error carried through moka's single-flight init: `None` means the key was
/// already known to be missing and nothing was attempted.
type LoadFailure = Option<Arc<TileError>>;

/// Bounded, thread-safe cache of decoded tiles.
pub struct TileCache {
    tiles: Cache<TileKey, Arc<RasterTile>>,
    source: Box<dyn TileSource>,
    reader: Box<dyn RasterReader>,
    missing: Arc<MissingTileRegistry>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    load_count: AtomicU64,
}

impl TileCache {
    /// Create a cache holding at most `capacity` tiles.
    pub fn new(
        capacity: u64,
        source: Box<dyn TileSource>,
        reader: Box<dyn RasterReader>,
        missing: Arc<MissingTileRegistry>,
    ) -> Self {
        Self {
            tiles: Cache::builder().max_capacity(capacity).build(),
            source,
            reader,
            missing,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            load_count: AtomicU64::new(0),
        }
    }

    /// Resolve `key` to a decoded tile.
    ///
    /// Returns [`Unavailable`] if the tile is known to be missing or fails to
    /// load now; in the latter case the key is recorded as missing.
    pub fn resolve(&self, key: &TileKey) -> Result<Arc<RasterTile>, Unavailable> {
        if self.missing.contains(key) {
            tracing::debug!(key = %key, "tile already recorded missing");
            return Err(Unavailable {
                key: key.clone(),
                cause: None,
            });
        }

        if let Some(tile) = self.tiles.get(key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        self.tiles
            .try_get_with(key.clone(), || self.load(key))
            .map_err(|failure: Arc<LoadFailure>| Unavailable {
                key: key.clone(),
                cause: (*failure).clone(),
            })
    }

    /// Locate and decode one tile. Runs at most once concurrently per key.
    fn load(&self, key: &TileKey) -> Result<Arc<RasterTile>, LoadFailure> {
        // A load that failed while this caller was queued has already
        // recorded the key
        if self.missing.contains(key) {
            return Err(None);
        }

        self.load_count.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(key = %key, "loading tile");

        let loaded = self
            .source
            .locate(key)
            .and_then(|path| self.reader.load(&path));

        match loaded {
            Ok(tile) => Ok(Arc::new(tile)),
            Err(e) => {
                if self.missing.record(key) {
                    tracing::warn!(key = %key, error = %e, "tile unavailable, recorded as missing");
                }
                Err(Some(Arc::new(e)))
            }
        }
    }

    /// The registry this cache records failures in.
    pub fn missing_registry(&self) -> &Arc<MissingTileRegistry> {
        &self.missing
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.tiles.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            load_count: self.load_count.load(Ordering::Relaxed),
            missing_count: self.missing.len() as u64,
        }
    }

    /// Maximum number of tiles held.
    pub fn capacity(&self) -> u64 {
        self.tiles.policy().max_capacity().unwrap_or(0)
    }

    /// Drop every cached tile. Missing-tile records are kept.
    pub fn clear(&self) {
        self.tiles.invalidate_all();
    }

    #[cfg(test)]
    fn run_pending_tasks(&self) {
        self.tiles.run_pending_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::filename::TileNaming;
    use crate::raster::GeoTransform;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc, Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    /// Pretends every tile exists at a path named after its key.
    struct EverywhereSource;

    impl TileSource for EverywhereSource {
        fn locate(&self, key: &TileKey) -> Result<PathBuf> {
            Ok(PathBuf::from(key.as_str()))
        }
    }

    /// Builds a 2x2 tile for any path, or fails for every path.
    struct CountingReader {
        loads: Arc<AtomicUsize>,
        delay: Duration,
        fail: bool,
    }

    impl CountingReader {
        fn new(loads: &Arc<AtomicUsize>) -> Self {
            Self {
                loads: Arc::clone(loads),
                delay: Duration::ZERO,
                fail: false,
            }
        }
    }

    impl RasterReader for CountingReader {
        fn load(&self, path: &Path) -> Result<RasterTile> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            if self.fail {
                return Err(TileError::FileNotFound {
                    path: path.to_path_buf(),
                });
            }
            let transform = GeoTransform::north_up(10.0, 48.0, 0.5, 0.5).unwrap();
            Ok(RasterTile::new(2, 2, -9999.0, transform, vec![1.0, 2.0, 3.0, 4.0]).unwrap())
        }
    }

    fn cache_with(reader: CountingReader, capacity: u64) -> TileCache {
        TileCache::new(
            capacity,
            Box::new(EverywhereSource),
            Box::new(reader),
            Arc::new(MissingTileRegistry::new()),
        )
    }

    fn key(lat: f64, lon: f64) -> TileKey {
        TileNaming::aster().key_for(lat, lon)
    }

    #[test]
    fn test_cache_hit() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(CountingReader::new(&loads), 10);
        let k = key(47.5, 10.5);

        let first = cache.resolve(&k).unwrap();
        let second = cache.resolve(&k).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
        assert_eq!(stats.load_count, 1);
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_memoized_miss() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut reader = CountingReader::new(&loads);
        reader.fail = true;
        let cache = cache_with(reader, 10);
        let k = key(47.5, 10.5);

        let first = cache.resolve(&k).unwrap_err();
        assert_eq!(first.key, k);
        assert!(first.cause.is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let second = cache.resolve(&k).unwrap_err();
        assert!(second.cause.is_none());
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        assert!(cache.missing_registry().contains(&k));
        assert_eq!(cache.stats().missing_count, 1);
    }

    #[test]
    fn test_concurrent_resolve_loads_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut reader = CountingReader::new(&loads);
        reader.delay = Duration::from_millis(50);
        let cache = cache_with(reader, 10);
        let k = key(47.5, 10.5);
        let barrier = Barrier::new(8);

        let tiles: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.resolve(&k)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let first = tiles[0].as_ref().unwrap();
        for tile in &tiles {
            assert!(Arc::ptr_eq(first, tile.as_ref().unwrap()));
        }
    }

    #[test]
    fn test_concurrent_failure_recorded_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut reader = CountingReader::new(&loads);
        reader.delay = Duration::from_millis(50);
        reader.fail = true;
        let cache = cache_with(reader, 10);
        let k = key(47.5, 10.5);
        let barrier = Barrier::new(8);

        let results: Vec<_> = thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        cache.resolve(&k)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r.is_err()));
        assert_eq!(cache.missing_registry().len(), 1);
    }

    #[test]
    fn test_different_keys_load_independently() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(CountingReader::new(&loads), 10);

        cache.resolve(&key(47.5, 10.5)).unwrap();
        cache.resolve(&key(48.5, 10.5)).unwrap();
        cache.resolve(&key(47.5, 10.9)).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    /// Blocks loads of one tile until released; other tiles load at once.
    struct GatedReader {
        gated: String,
        started: Mutex<mpsc::Sender<()>>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl RasterReader for GatedReader {
        fn load(&self, path: &Path) -> Result<RasterTile> {
            if path.ends_with(&self.gated) {
                let _ = self.started.lock().unwrap().send(());
                let _ = self.release.lock().unwrap().recv();
            }
            CountingReader::new(&Arc::new(AtomicUsize::new(0))).load(path)
        }
    }

    #[test]
    fn test_different_keys_do_not_block_each_other() {
        let slow = key(47.5, 10.5);
        let fast = key(48.5, 10.5);
        let (started_tx, started) = mpsc::channel();
        let (release_tx, release) = mpsc::channel();
        let (done_tx, done) = mpsc::channel();

        let cache = TileCache::new(
            10,
            Box::new(EverywhereSource),
            Box::new(GatedReader {
                gated: slow.to_string(),
                started: Mutex::new(started_tx),
                release: Mutex::new(release),
            }),
            Arc::new(MissingTileRegistry::new()),
        );

        thread::scope(|s| {
            let slow_load = s.spawn(|| cache.resolve(&slow).is_ok());
            started.recv_timeout(Duration::from_secs(5)).unwrap();

            s.spawn(|| {
                let ok = cache.resolve(&fast).is_ok();
                done_tx.send(ok).unwrap();
            });
            // The slow tile is still loading while the other one resolves
            let fast_result = done.recv_timeout(Duration::from_secs(5));
            let slow_still_loading = !slow_load.is_finished();

            release_tx.send(()).unwrap();
            assert_eq!(fast_result, Ok(true));
            assert!(slow_still_loading);
            assert!(slow_load.join().unwrap());
        });
    }

    #[test]
    fn test_eviction_is_transparent() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(CountingReader::new(&loads), 1);
        let a = key(47.5, 10.5);
        let b = key(48.5, 11.5);

        for _ in 0..3 {
            assert_eq!(cache.resolve(&a).unwrap().get(0, 0), Some(1.0));
            assert_eq!(cache.resolve(&b).unwrap().get(1, 1), Some(4.0));
            cache.run_pending_tasks();
        }

        assert!(cache.stats().entry_count <= 1);
        assert!(cache.missing_registry().is_empty());
    }

    #[test]
    fn test_clear_cache() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(CountingReader::new(&loads), 10);
        let k = key(47.5, 10.5);

        cache.resolve(&k).unwrap();
        cache.clear();
        cache.resolve(&k).unwrap();

        assert_eq!(loads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cache_capacity() {
        let loads = Arc::new(AtomicUsize::new(0));
        let cache = cache_with(CountingReader::new(&loads), 42);
        assert_eq!(cache.capacity(), 42);
    }

    #[test]
    fn test_hit_rate_without_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
