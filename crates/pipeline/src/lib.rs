//! Chunked concurrent synthesis pipeline
//!
//! This crate turns request text into ordered audio:
//! - Text segmentation into bounded units (with memoization)
//! - Engine seam plus the built-in tone engine
//! - Per-locale engine handle cache and content-addressed audio cache
//! - Concurrency-limited scheduler with in-order resequencing
//! - Background cache maintenance

pub mod cache;
pub mod engine;
pub mod maintenance;
pub mod scheduler;
pub mod segmenter;

pub use cache::{AudioCache, AudioCacheStats, CacheSnapshot, EngineCache};
pub use engine::{
    create_factory, EngineFactory, EngineHandle, SynthesisEngine, ToneEngine, ToneEngineFactory,
};
pub use maintenance::MaintenanceLoop;
pub use scheduler::{
    default_concurrency, CancelSignal, ChunkScheduler, Resequencer, SchedulerConfig,
    SynthesisStream, WorkerPool,
};
pub use segmenter::{segment, Segmenter};
