//! Synthesis engine seam
//!
//! Engines are expensive, bound to one locale and called from blocking
//! worker threads. Factories construct them asynchronously.

mod tone;

pub use tone::{ToneEngine, ToneEngineFactory};

use std::sync::Arc;

use soulgate_config::{EngineBackend, EngineConfig};
use soulgate_core::{AudioBuffer, EngineError};

/// A loaded speech engine for one locale
pub trait SynthesisEngine: Send + Sync {
    /// Locale this engine was built for
    fn locale(&self) -> &str;

    /// Output sample rate
    fn sample_rate(&self) -> u32;

    /// Render `text` with `voice` at `speed`. Blocking; run on a worker thread.
    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<AudioBuffer, EngineError>;
}

/// Shared engine handle; callers keep it alive for the duration of a call
pub type EngineHandle = Arc<dyn SynthesisEngine>;

/// Builds engine handles on demand
#[async_trait::async_trait]
pub trait EngineFactory: Send + Sync {
    async fn create(&self, locale: &str) -> Result<EngineHandle, EngineError>;
}

/// Create the configured engine factory
pub fn create_factory(config: &EngineConfig) -> Arc<dyn EngineFactory> {
    match config.backend {
        EngineBackend::Tone => Arc::new(ToneEngineFactory::new(config.sample_rate)),
    }
}
