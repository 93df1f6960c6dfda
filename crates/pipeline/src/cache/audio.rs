//! Synthesized audio cache
//!
//! Content-addressed by [`CacheKey`]. Entries expire after a TTL and the
//! oldest are evicted in batches once capacity is exceeded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use soulgate_config::CacheConfig;
use soulgate_core::{AudioBuffer, CacheKey};

/// Cache statistics
#[derive(Debug, Default)]
pub struct AudioCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub expirations: AtomicU64,
}

impl AudioCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_evictions(&self, count: usize) {
        self.evictions.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn record_expirations(&self, count: usize) {
        self.expirations.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Point-in-time view for the statistics endpoints
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub entries: usize,
    pub capacity: usize,
    pub ttl_secs: u64,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub hit_rate: f64,
}

#[derive(Debug)]
struct CachedAudio {
    audio: AudioBuffer,
    stored_at: Instant,
}

impl CachedAudio {
    fn new(audio: AudioBuffer) -> Arc<Self> {
        Arc::new(Self {
            audio,
            stored_at: Instant::now(),
        })
    }

    fn is_expired(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() >= ttl
    }
}

pub struct AudioCache {
    capacity: usize,
    ttl: Duration,
    eviction_fraction: f32,
    entries: RwLock<HashMap<CacheKey, Arc<CachedAudio>>>,
    pub stats: AudioCacheStats,
}

impl AudioCache {
    pub fn new(capacity: usize, ttl: Duration, eviction_fraction: f32) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            eviction_fraction: eviction_fraction.clamp(f32::EPSILON, 1.0),
            entries: RwLock::new(HashMap::with_capacity(capacity)),
            stats: AudioCacheStats::default(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            config.capacity,
            Duration::from_secs(config.ttl_secs),
            config.eviction_fraction,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up audio; expired entries are removed and count as a miss.
    /// A hit refreshes the entry's timestamp.
    pub fn get(&self, key: &CacheKey) -> Option<AudioBuffer> {
        let found = self.entries.read().get(key).cloned();

        let Some(entry) = found else {
            self.stats.record_miss();
            return None;
        };

        let mut entries = self.entries.write();
        let still_current = entries
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current, &entry));

        if entry.is_expired(self.ttl) {
            if still_current {
                entries.remove(key);
                self.stats.record_expirations(1);
            }
            self.stats.record_miss();
            return None;
        }

        if still_current {
            entries.insert(key.clone(), CachedAudio::new(entry.audio.clone()));
        }
        self.stats.record_hit();
        Some(entry.audio.clone())
    }

    /// Store audio, evicting the oldest entries if capacity is exceeded
    pub fn put(&self, key: CacheKey, audio: AudioBuffer) {
        let mut entries = self.entries.write();
        entries.insert(key, CachedAudio::new(audio));

        let len = entries.len();
        if len <= self.capacity {
            return;
        }

        let batch = (len as f32 * self.eviction_fraction).ceil() as usize;
        let to_evict = batch.max(len - self.capacity).min(len);

        let mut by_age: Vec<(Instant, CacheKey)> = entries
            .iter()
            .map(|(k, v)| (v.stored_at, k.clone()))
            .collect();
        by_age.sort_by_key(|(stored_at, _)| *stored_at);

        for (_, key) in by_age.into_iter().take(to_evict) {
            entries.remove(&key);
        }

        self.stats.record_evictions(to_evict);
        tracing::debug!(evicted = to_evict, remaining = entries.len(), "Audio cache eviction");
    }

    /// Remove every entry at least `ttl` old, returning how many were removed
    pub fn expire_older_than(&self, ttl: Duration) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(ttl));
        let removed = before - entries.len();

        if removed > 0 {
            entries.shrink_to_fit();
            self.stats.record_expirations(removed);
        }
        removed
    }

    /// Remove every entry, returning how many were dropped
    pub fn clear(&self) -> usize {
        let mut entries = self.entries.write();
        let removed = entries.len();
        entries.clear();
        entries.shrink_to_fit();
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Approximate memory held by cached samples
    pub fn bytes(&self) -> usize {
        self.entries.read().values().map(|e| e.audio.byte_size()).sum()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let (entries, bytes) = {
            let guard = self.entries.read();
            (guard.len(), guard.values().map(|e| e.audio.byte_size()).sum())
        };

        CacheSnapshot {
            entries,
            capacity: self.capacity,
            ttl_secs: self.ttl.as_secs(),
            bytes,
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expirations: self.stats.expirations.load(Ordering::Relaxed),
            hit_rate: self.stats.hit_rate(),
        }
    }
}
