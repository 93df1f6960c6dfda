//! Application State
//!
//! Shared state across all handlers.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use soulgate_config::Settings;
use soulgate_pipeline::{
    create_factory, maintenance, AudioCache, ChunkScheduler, EngineCache, EngineFactory,
    SchedulerConfig, Segmenter, WorkerPool,
};

use crate::stats::RequestStats;

/// Application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration
    pub settings: Arc<Settings>,
    /// Memoizing text segmenter
    pub segmenter: Arc<Segmenter>,
    /// Synthesized audio cache
    pub audio_cache: Arc<AudioCache>,
    /// Per-locale engine handles
    pub engines: Arc<EngineCache>,
    /// Chunk scheduler over the shared worker pool
    pub scheduler: ChunkScheduler,
    /// Request counters
    pub stats: Arc<RequestStats>,
    pub started_at: Instant,
}

/// Result of `POST /cache/clear`
#[derive(Debug, Clone, Serialize)]
pub struct ClearReport {
    pub audio_entries: usize,
    pub segmentations: usize,
}

impl AppState {
    /// Create state with the configured engine backend
    pub fn new(settings: Settings) -> Self {
        let factory = create_factory(&settings.engine);
        Self::with_factory(settings, factory)
    }

    /// Create state around a specific engine factory
    pub fn with_factory(settings: Settings, factory: Arc<dyn EngineFactory>) -> Self {
        let audio_cache = Arc::new(AudioCache::from_config(&settings.cache));
        let engines = Arc::new(EngineCache::new(factory, settings.engine.max_handles));
        let scheduler = ChunkScheduler::new(
            Arc::clone(&engines),
            Arc::clone(&audio_cache),
            WorkerPool::new(settings.synthesis.worker_pool_size),
            SchedulerConfig::from_config(&settings.synthesis),
        );

        Self {
            segmenter: Arc::new(Segmenter::new(settings.cache.segment_memo_capacity)),
            settings: Arc::new(settings),
            audio_cache,
            engines,
            scheduler,
            stats: Arc::new(RequestStats::default()),
            started_at: Instant::now(),
        }
    }

    /// Drop cached audio and memoized segmentations, then run a reclamation pass
    pub fn clear_caches(&self) -> ClearReport {
        let segmentations = self.segmenter.len();
        self.segmenter.clear();
        let audio_entries = self.audio_cache.clear();
        maintenance::run_pass(&self.audio_cache);

        tracing::info!(audio_entries, segmentations, "Caches cleared");

        ClearReport {
            audio_entries,
            segmentations,
        }
    }
}
