//! In-memory LRU cache for extracted data tiles.
//!
//! Tiles are the sampled values behind one map request, keyed by
//! [`TileCacheKey`]. Reading them again from the source files (and, for
//! curvilinear grids, resolving every pixel) is far more expensive than
//! keeping them in memory.
//!
//! ## Eviction
//!
//! - Entry count: the least-recently-used tile is dropped when the cache
//!   holds `max_entries` tiles.
//! - Memory: when a new tile would exceed the byte budget, ~5% of the
//!   budget is evicted in one LRU-ordered batch.
//! - Age: tiles older than the TTL are dropped lazily on read and by a
//!   periodic sweeper task, independent of LRU order.
//!
//! ## Enablement
//!
//! The cache can be switched off at runtime. While disabled every `get`
//! misses and every `put` is a no-op, so callers need no special casing.
//!
//! Concurrent misses on the same key may both compute and both store the
//! tile; the last write wins.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info, warn};
use wms_common::DataTile;

use crate::config::TileCacheConfig;
use crate::tile_cache_key::TileCacheKey;

/// In-memory LRU cache for data tiles.
pub struct TileCache {
    cache: Arc<RwLock<LruCache<TileCacheKey, CachedTile>>>,
    enabled: AtomicBool,
    max_entries: usize,
    max_bytes: u64,
    ttl: Duration,
    sweep_interval: Option<Duration>,
    stats: Arc<TileCacheStats>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

struct CachedTile {
    tile: Arc<DataTile>,
    size: u64,
    inserted_at: Instant,
}

impl CachedTile {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Counters for the tile cache, readable without taking the cache lock.
#[derive(Default)]
pub struct TileCacheStats {
    /// Lookups answered with a live tile
    pub hits: AtomicU64,
    /// Lookups for absent keys, including keys whose tile had expired
    pub misses: AtomicU64,
    /// Tiles dropped to respect the byte budget or the entry cap
    pub evictions: AtomicU64,
    /// Tiles dropped for outliving the TTL, on lookup or by the sweeper
    pub expired: AtomicU64,
    /// Sum of `DataTile::byte_size` over cached tiles
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
    /// Puts that had to free space before inserting
    pub eviction_runs: AtomicU64,
    /// Tiles never stored because one alone exceeds the byte budget
    pub rejected: AtomicU64,
}

impl TileCacheStats {
    /// Calculate cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            (hits as f64 / total as f64) * 100.0
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    pub fn expired(&self) -> u64 {
        self.expired.load(Ordering::Relaxed)
    }

    /// Get current entry count.
    pub fn entry_count(&self) -> u64 {
        self.entry_count.load(Ordering::Relaxed)
    }

    /// Get number of eviction runs.
    pub fn eviction_runs(&self) -> u64 {
        self.eviction_runs.load(Ordering::Relaxed)
    }

    /// Get current size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits.load(Ordering::Relaxed)),
            misses: AtomicU64::new(self.misses.load(Ordering::Relaxed)),
            evictions: AtomicU64::new(self.evictions.load(Ordering::Relaxed)),
            expired: AtomicU64::new(self.expired.load(Ordering::Relaxed)),
            size_bytes: AtomicU64::new(self.size_bytes.load(Ordering::Relaxed)),
            entry_count: AtomicU64::new(self.entry_count.load(Ordering::Relaxed)),
            eviction_runs: AtomicU64::new(self.eviction_runs.load(Ordering::Relaxed)),
            rejected: AtomicU64::new(self.rejected.load(Ordering::Relaxed)),
        }
    }
}

impl TileCache {
    /// Create a cache from configuration.
    ///
    /// The expiry sweeper is not started here; call
    /// [`spawn_sweeper`](Self::spawn_sweeper) from within a tokio runtime.
    pub fn new(config: &TileCacheConfig) -> Self {
        let mut cache = Self::with_limits(config.max_entries, config.max_size_bytes(), config.ttl());
        cache.sweep_interval = config.sweep_interval();
        cache.enabled = AtomicBool::new(config.enabled);
        cache
    }

    /// Create an enabled cache with explicit limits and no sweeper.
    pub fn with_limits(max_entries: usize, max_bytes: u64, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            enabled: AtomicBool::new(true),
            max_entries: capacity.get(),
            max_bytes,
            ttl,
            sweep_interval: None,
            stats: Arc::new(TileCacheStats::default()),
            sweeper: Mutex::new(None),
        }
    }

    /// Set the interval used by [`spawn_sweeper`](Self::spawn_sweeper).
    pub fn with_sweep_interval(mut self, every: Duration) -> Self {
        self.sweep_interval = Some(every);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Switch caching on or off at runtime.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::Relaxed);
        if was != enabled {
            info!(enabled = enabled, "Tile cache enablement changed");
        }
    }

    /// Get a tile from the cache (None if disabled, expired or missing).
    pub async fn get(&self, key: &TileCacheKey) -> Option<Arc<DataTile>> {
        if !self.is_enabled() {
            return None;
        }

        let mut cache = self.cache.write().await;

        match cache.get(key) {
            Some(cached) if cached.is_expired(self.ttl) => {
                let size = cached.size;
                cache.pop(key);
                self.stats.expired.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                self.stats.size_bytes.fetch_sub(size, Ordering::Relaxed);
                self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
                None
            }
            Some(cached) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(Arc::clone(&cached.tile))
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a tile.
    ///
    /// Returns false if the tile was not stored: the cache is disabled or
    /// the tile alone exceeds the memory budget.
    pub async fn put(&self, key: TileCacheKey, tile: Arc<DataTile>) -> bool {
        if !self.is_enabled() {
            return false;
        }

        let size = tile.byte_size() as u64;
        if size > self.max_bytes {
            self.stats.rejected.fetch_add(1, Ordering::Relaxed);
            warn!(
                tile_bytes = size,
                max_bytes = self.max_bytes,
                key = %key,
                "Tile exceeds cache budget, not caching"
            );
            return false;
        }

        let mut cache = self.cache.write().await;

        if let Some(existing) = cache.pop(&key) {
            self.stats
                .size_bytes
                .fetch_sub(existing.size, Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
        }

        // Check if we need to evict before inserting (done inside lock to avoid race)
        let current_bytes = self.stats.size_bytes.load(Ordering::Relaxed);
        if current_bytes + size > self.max_bytes {
            self.evict_batch_locked(&mut cache, size);
        }
        if cache.len() >= self.max_entries {
            if let Some((_, evicted)) = cache.pop_lru() {
                self.stats
                    .size_bytes
                    .fetch_sub(evicted.size, Ordering::Relaxed);
                self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
            }
        }

        cache.put(
            key,
            CachedTile {
                tile,
                size,
                inserted_at: Instant::now(),
            },
        );
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);
        true
    }

    /// Evict ~5% of the memory budget using LRU order, and at least enough
    /// to fit `incoming` bytes.
    ///
    /// Returns (entries_evicted, bytes_freed).
    fn evict_batch_locked(
        &self,
        cache: &mut LruCache<TileCacheKey, CachedTile>,
        incoming: u64,
    ) -> (usize, u64) {
        let current_bytes = self.stats.size_bytes.load(Ordering::Relaxed);
        let target_free = (self.max_bytes / 20)
            .max((current_bytes + incoming).saturating_sub(self.max_bytes));

        let mut bytes_freed = 0u64;
        let mut entries_evicted = 0usize;
        while bytes_freed < target_free {
            match cache.pop_lru() {
                Some((_, evicted)) => {
                    bytes_freed += evicted.size;
                    entries_evicted += 1;
                }
                None => break,
            }
        }

        self.stats
            .size_bytes
            .fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(entries_evicted as u64, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(entries_evicted as u64, Ordering::Relaxed);
        self.stats.eviction_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            entries_evicted = entries_evicted,
            bytes_freed_mb = format!("{:.2}", bytes_freed as f64 / (1024.0 * 1024.0)),
            cache_size_mb =
                format!("{:.2}", (current_bytes - bytes_freed) as f64 / (1024.0 * 1024.0)),
            max_size_mb = format!("{:.2}", self.max_bytes as f64 / (1024.0 * 1024.0)),
            "Tile cache batch eviction completed"
        );

        (entries_evicted, bytes_freed)
    }

    /// Drop every tile older than the TTL. Returns the number dropped.
    pub async fn sweep_expired(&self) -> usize {
        let mut cache = self.cache.write().await;

        let expired: Vec<TileCacheKey> = cache
            .iter()
            .filter(|(_, cached)| cached.is_expired(self.ttl))
            .map(|(key, _)| key.clone())
            .collect();

        let mut bytes_freed = 0u64;
        for key in &expired {
            if let Some(cached) = cache.pop(key) {
                bytes_freed += cached.size;
            }
        }

        self.stats
            .size_bytes
            .fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(expired.len() as u64, Ordering::Relaxed);
        self.stats
            .expired
            .fetch_add(expired.len() as u64, Ordering::Relaxed);

        if expired.is_empty() {
            debug!(entries = cache.len(), "Tile cache sweep found nothing to expire");
        } else {
            info!(
                expired = expired.len(),
                bytes_freed = bytes_freed,
                remaining = cache.len(),
                "Tile cache expiry sweep completed"
            );
        }

        expired.len()
    }

    /// Start the periodic expiry sweeper if configured and not running.
    ///
    /// Must be called from within a tokio runtime; otherwise a warning is
    /// logged and no sweeper runs. The task holds only a weak reference and
    /// stops once the cache is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) {
        let Some(every) = self.sweep_interval else {
            debug!("Tile cache sweeper disabled");
            return;
        };

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "No tokio runtime, tile cache sweeper not started");
                return;
            }
        };

        let mut sweeper = self.sweeper.lock().unwrap_or_else(PoisonError::into_inner);
        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        let weak: Weak<Self> = Arc::downgrade(self);
        info!(
            interval_secs = every.as_secs_f64(),
            ttl_secs = self.ttl.as_secs(),
            "Starting tile cache sweeper"
        );
        *sweeper = Some(runtime.spawn(async move {
            let mut ticker = interval(every);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match weak.upgrade() {
                    Some(cache) => {
                        cache.sweep_expired().await;
                    }
                    None => break,
                }
            }
        }));
    }

    /// Whether a sweeper task is currently running.
    pub fn sweeper_running(&self) -> bool {
        self.sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the sweeper and drop every cached tile.
    pub async fn shutdown(&self) {
        let handle = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
        self.clear().await;
        info!("Tile cache shut down");
    }

    /// Get current statistics.
    pub fn stats(&self) -> TileCacheStats {
        self.stats.snapshot()
    }

    /// Current number of entries in cache.
    pub fn len(&self) -> usize {
        self.stats.entry_count.load(Ordering::Relaxed) as usize
    }

    /// Check if cache is empty.
    pub fn is_empty(&self) -> bool {
        self.stats.entry_count.load(Ordering::Relaxed) == 0
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Get maximum cache size in bytes.
    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get current cache size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.stats.size_bytes.load(Ordering::Relaxed)
    }

    /// Clear all cached entries and reset statistics.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();

        self.stats.hits.store(0, Ordering::Relaxed);
        self.stats.misses.store(0, Ordering::Relaxed);
        self.stats.evictions.store(0, Ordering::Relaxed);
        self.stats.expired.store(0, Ordering::Relaxed);
        self.stats.size_bytes.store(0, Ordering::Relaxed);
        self.stats.entry_count.store(0, Ordering::Relaxed);
        self.stats.eviction_runs.store(0, Ordering::Relaxed);
        self.stats.rejected.store(0, Ordering::Relaxed);
    }
}

impl Drop for TileCache {
    fn drop(&mut self) {
        if let Some(handle) = self
            .sweeper
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{TestDataset, TestLayer};
    use wms_common::{BoundingBox, CrsCode, RegularGrid};

    fn key(n: usize) -> TileCacheKey {
        let layer = TestLayer::new("ds/var", TestDataset::new("ds", "/nonexistent/ds.nc"));
        let grid = RegularGrid::new(
            CrsCode::Epsg4326,
            BoundingBox::new(n as f64, 0.0, n as f64 + 1.0, 1.0),
            16,
            16,
        );
        TileCacheKey::new("/nonexistent/ds.nc", &layer, &grid, Some(0), None).unwrap()
    }

    fn tile(width: usize, value: f32) -> Arc<DataTile> {
        Arc::new(DataTile::from_samples(
            width,
            width,
            std::iter::repeat(Some(value)),
        ))
    }

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = TileCache::with_limits(100, 100 * 1024 * 1024, Duration::from_secs(60));

        assert!(cache.is_empty());
        assert!(cache.get(&key(0)).await.is_none());

        let data = tile(4, 1.5);
        assert!(cache.put(key(0), Arc::clone(&data)).await);
        assert_eq!(cache.len(), 1);

        let retrieved = cache.get(&key(0)).await.unwrap();
        assert_eq!(*retrieved, *data);

        let stats = cache.stats();
        assert_eq!(stats.hits(), 1);
        assert_eq!(stats.misses(), 1);
        assert_eq!(stats.entry_count(), 1);
        assert_eq!(stats.hit_rate(), 50.0);
    }

    #[tokio::test]
    async fn test_disabled_cache_misses_and_ignores_puts() {
        let cache = TileCache::with_limits(100, 1024 * 1024, Duration::from_secs(60));
        cache.set_enabled(false);

        assert!(!cache.put(key(0), tile(4, 1.0)).await);
        assert!(cache.is_empty());

        cache.set_enabled(true);
        cache.put(key(0), tile(4, 1.0)).await;
        cache.set_enabled(false);
        assert!(cache.get(&key(0)).await.is_none());

        cache.set_enabled(true);
        assert!(cache.get(&key(0)).await.is_some());
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = TileCache::with_limits(100, 1024 * 1024, Duration::from_millis(100));

        cache.put(key(0), tile(4, 1.0)).await;
        assert!(cache.get(&key(0)).await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(cache.get(&key(0)).await.is_none());

        let stats = cache.stats();
        assert_eq!(stats.expired(), 1);
        assert_eq!(stats.entry_count(), 0);
        assert_eq!(stats.size_bytes(), 0);
    }

    #[tokio::test]
    async fn test_entry_limit_evicts_least_recently_used() {
        let cache = TileCache::with_limits(2, 1024 * 1024, Duration::from_secs(60));

        cache.put(key(0), tile(4, 0.0)).await;
        cache.put(key(1), tile(4, 1.0)).await;
        // Touch key 0 so key 1 becomes least recently used
        assert!(cache.get(&key(0)).await.is_some());
        cache.put(key(2), tile(4, 2.0)).await;

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key(1)).await.is_none());
        assert!(cache.get(&key(0)).await.is_some());
        assert!(cache.get(&key(2)).await.is_some());
        assert_eq!(cache.stats().evictions(), 1);
    }

    #[tokio::test]
    async fn test_cache_memory_based_eviction() {
        // 1MB cache, tiles of ~100KB
        let cache = TileCache::with_limits(1000, 1024 * 1024, Duration::from_secs(60));
        for i in 0..15 {
            cache.put(key(i), tile(160, i as f32)).await;
        }

        let stats = cache.stats();
        assert!(stats.evictions() > 0);
        assert!(stats.eviction_runs() > 0);
        assert!(stats.size_bytes() <= 1024 * 1024);
        // Most recent tile survives
        assert!(cache.get(&key(14)).await.is_some());
    }

    #[tokio::test]
    async fn test_replacing_entry_keeps_count() {
        let cache = TileCache::with_limits(100, 1024 * 1024, Duration::from_secs(60));

        cache.put(key(0), tile(4, 1.0)).await;
        cache.put(key(1), tile(4, 2.0)).await;
        let before = cache.size_bytes();

        cache.put(key(0), tile(8, 3.0)).await;
        assert_eq!(cache.len(), 2);
        assert_eq!(
            cache.size_bytes(),
            before - tile(4, 0.0).byte_size() as u64 + tile(8, 0.0).byte_size() as u64
        );
        assert_eq!(cache.get(&key(0)).await.unwrap().get(0), Some(3.0));
    }

    #[tokio::test]
    async fn test_oversized_tile_rejected() {
        let cache = TileCache::with_limits(100, 1024, Duration::from_secs(60));
        assert!(!cache.put(key(0), tile(64, 1.0)).await);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().rejected.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_sweep_expired() {
        let cache = TileCache::with_limits(100, 1024 * 1024, Duration::from_millis(50));
        cache.put(key(0), tile(4, 1.0)).await;
        cache.put(key(1), tile(4, 1.0)).await;

        assert_eq!(cache.sweep_expired().await, 0);
        tokio::time::sleep(Duration::from_millis(80)).await;
        cache.put(key(2), tile(4, 1.0)).await;

        assert_eq!(cache.sweep_expired().await, 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), tile(4, 0.0).byte_size() as u64);
    }

    #[tokio::test]
    async fn test_sweeper_task_and_shutdown() {
        let cache = Arc::new(
            TileCache::with_limits(100, 1024 * 1024, Duration::from_millis(30))
                .with_sweep_interval(Duration::from_millis(20)),
        );
        cache.spawn_sweeper();
        assert!(cache.sweeper_running());

        cache.put(key(0), tile(4, 1.0)).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        // Removed by the sweeper without any read
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired(), 1);

        cache.put(key(1), tile(4, 1.0)).await;
        cache.shutdown().await;
        assert!(cache.is_empty());
        tokio::task::yield_now().await;
        assert!(!cache.sweeper_running());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = TileCacheConfig {
            enabled: false,
            max_entries: 5,
            max_size_mb: 2,
            ttl_secs: 10,
            sweep_interval_secs: 0,
        };
        let cache = TileCache::new(&config);
        assert!(!cache.is_enabled());
        assert_eq!(cache.max_entries(), 5);
        assert_eq!(cache.max_bytes(), 2 * 1024 * 1024);
        assert_eq!(cache.ttl(), Duration::from_secs(10));

        let cache = Arc::new(cache);
        cache.spawn_sweeper();
        assert!(!cache.sweeper_running());
    }
}
