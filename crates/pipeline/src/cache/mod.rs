//! Process-wide caches shared by every request
//!
//! - [`EngineCache`]: bounded set of per-locale engine handles
//! - [`AudioCache`]: content-addressed synthesized audio with TTL

mod audio;
mod engine;

pub use audio::{AudioCache, AudioCacheStats, CacheSnapshot};
pub use engine::EngineCache;
