//! Synthesis pipeline configuration

use serde::{Deserialize, Serialize};

/// Chunked synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Maximum characters per text unit for complete (non-streaming) requests
    #[serde(default = "default_max_unit_chars")]
    pub max_unit_chars: usize,

    /// Maximum characters per text unit for streaming requests
    #[serde(default = "default_stream_max_unit_chars")]
    pub stream_max_unit_chars: usize,

    /// Upper bound on units in flight for a single request
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Size of the shared worker pool running blocking engine calls
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,

    /// Maximum wait for the next streamed unit (seconds)
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Silence substituted for a failed unit (ms)
    #[serde(default = "default_silence_ms")]
    pub silence_ms: u32,

    /// Client disconnect polling interval (ms)
    #[serde(default = "default_disconnect_poll")]
    pub disconnect_poll_ms: u64,
}

fn default_max_unit_chars() -> usize {
    500
}
fn default_stream_max_unit_chars() -> usize {
    800
}
fn default_max_concurrency() -> usize {
    6
}
fn default_worker_pool_size() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(2)
        .max(2)
}
fn default_fetch_timeout() -> u64 {
    25
}
fn default_silence_ms() -> u32 {
    100
}
fn default_disconnect_poll() -> u64 {
    500
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_unit_chars: default_max_unit_chars(),
            stream_max_unit_chars: default_stream_max_unit_chars(),
            max_concurrency: default_max_concurrency(),
            worker_pool_size: default_worker_pool_size(),
            fetch_timeout_secs: default_fetch_timeout(),
            silence_ms: default_silence_ms(),
            disconnect_poll_ms: default_disconnect_poll(),
        }
    }
}

/// Synthesis engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineBackend {
    /// Built-in deterministic tone renderer
    Tone,
}

/// Engine handle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Engine backend
    #[serde(default = "default_backend")]
    pub backend: EngineBackend,

    /// Maximum number of per-locale engine handles kept alive
    #[serde(default = "default_max_handles")]
    pub max_handles: usize,

    /// Output sample rate
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_backend() -> EngineBackend {
    EngineBackend::Tone
}
fn default_max_handles() -> usize {
    5
}
fn default_sample_rate() -> u32 {
    24000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            max_handles: default_max_handles(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Audio result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum cached units
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entry time-to-live (seconds)
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,

    /// Share of entries evicted once capacity is exceeded
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f32,

    /// Maintenance loop period (seconds)
    #[serde(default = "default_maintenance_interval")]
    pub maintenance_interval_secs: u64,

    /// Memoized segmentations kept
    #[serde(default = "default_segment_memo")]
    pub segment_memo_capacity: usize,
}

fn default_capacity() -> usize {
    100
}
fn default_ttl() -> u64 {
    3600
}
fn default_eviction_fraction() -> f32 {
    0.2
}
fn default_maintenance_interval() -> u64 {
    300
}
fn default_segment_memo() -> usize {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            ttl_secs: default_ttl(),
            eviction_fraction: default_eviction_fraction(),
            maintenance_interval_secs: default_maintenance_interval(),
            segment_memo_capacity: default_segment_memo(),
        }
    }
}
