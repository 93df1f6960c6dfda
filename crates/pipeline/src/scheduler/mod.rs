//! Chunk scheduler
//!
//! Dispatches text units to the worker pool under a per-request admission
//! limit and hands results back in unit order, either all at once or as a
//! stream.

mod cancel;
mod pool;
mod resequencer;

pub use cancel::CancelSignal;
pub use pool::WorkerPool;
pub use resequencer::Resequencer;

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use soulgate_config::SynthesisConfig;
use soulgate_core::{AudioBuffer, CacheKey, Error, Result, SynthesisParams, TextUnit};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::Instant;

use crate::cache::{AudioCache, EngineCache};

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Longest wait for the next in-order unit when streaming
    pub fetch_timeout: Duration,
    /// Silence substituted for a failed unit
    pub silence_ms: u32,
    /// Upper bound on per-request concurrency
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_config(&SynthesisConfig::default())
    }
}

impl SchedulerConfig {
    pub fn from_config(config: &SynthesisConfig) -> Self {
        Self {
            fetch_timeout: Duration::from_secs(config.fetch_timeout_secs),
            silence_ms: config.silence_ms,
            max_concurrency: config.max_concurrency,
        }
    }
}

/// Concurrency limit for a request of `unit_count` units.
///
/// Available parallelism clamped to `[1, min(pool_size / 2, max_concurrency, unit_count)]`.
pub fn default_concurrency(pool_size: usize, unit_count: usize, max_concurrency: usize) -> usize {
    let parallelism = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let upper = (pool_size / 2).min(max_concurrency).min(unit_count).max(1);
    parallelism.clamp(1, upper)
}

type UnitResult = (usize, Result<AudioBuffer>);

/// Drives synthesis for requests. Cheap to clone; all state is shared.
#[derive(Clone)]
pub struct ChunkScheduler {
    engines: Arc<EngineCache>,
    audio_cache: Arc<AudioCache>,
    pool: WorkerPool,
    config: SchedulerConfig,
}

impl ChunkScheduler {
    pub fn new(
        engines: Arc<EngineCache>,
        audio_cache: Arc<AudioCache>,
        pool: WorkerPool,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            engines,
            audio_cache,
            pool,
            config,
        }
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Default concurrency limit for `unit_count` units
    pub fn concurrency_for(&self, unit_count: usize) -> usize {
        default_concurrency(self.pool.size(), unit_count, self.config.max_concurrency)
    }

    /// Produce audio for one unit.
    ///
    /// Engine failures are absorbed as silence at the engine's sample rate.
    /// Only a missing engine fails the unit.
    pub async fn synthesize_unit(&self, unit: &TextUnit, params: &SynthesisParams) -> Result<AudioBuffer> {
        let key = CacheKey::new(&unit.text, params);
        if let Some(audio) = self.audio_cache.get(&key) {
            metrics::counter!("soulgate_audio_cache_hits_total").increment(1);
            return Ok(audio);
        }
        metrics::counter!("soulgate_audio_cache_misses_total").increment(1);

        let engine = self.engines.acquire(&params.locale).await?;
        let sample_rate = engine.sample_rate();

        let text = unit.text.clone();
        let voice = params.voice.clone();
        let speed = params.speed;
        let outcome = self
            .pool
            .run(move || engine.synthesize(&text, &voice, speed))
            .await
            .and_then(|result| result);

        match outcome {
            Ok(audio) => {
                metrics::counter!("soulgate_units_synthesized_total").increment(1);
                self.audio_cache.put(key, audio.clone());
                Ok(audio)
            }
            Err(source) => {
                let err = Error::UnitSynthesisFailure {
                    index: unit.index,
                    source,
                };
                tracing::warn!(
                    index = unit.index,
                    chars = unit.char_len(),
                    error = %err,
                    "Unit synthesis failed, substituting silence"
                );
                metrics::counter!("soulgate_unit_failures_total").increment(1);
                Ok(AudioBuffer::silence(self.config.silence_ms, sample_rate))
            }
        }
    }

    /// Synthesize every unit and concatenate the results in order
    pub async fn synthesize(
        &self,
        units: Arc<Vec<TextUnit>>,
        params: SynthesisParams,
        limit: usize,
    ) -> Result<AudioBuffer> {
        if units.is_empty() {
            return Err(Error::invalid_input("no text to synthesize"));
        }

        let unit_count = units.len();
        let mut stream = self.spawn_stream(units, params, limit, CancelSignal::new(), None);
        let mut parts = Vec::with_capacity(unit_count);

        while let Some(item) = stream.next().await {
            match item {
                Ok((_, audio)) => parts.push(audio),
                Err(e) => {
                    stream.close().await;
                    return Err(e);
                }
            }
        }
        stream.close().await;

        let sample_rate = parts.first().map(AudioBuffer::sample_rate).unwrap_or_default();
        Ok(AudioBuffer::concat(&parts, sample_rate))
    }

    /// Start streaming synthesis. Units are yielded in index order, each
    /// within the configured fetch timeout.
    pub fn stream(
        &self,
        units: Arc<Vec<TextUnit>>,
        params: SynthesisParams,
        limit: usize,
        cancel: CancelSignal,
    ) -> SynthesisStream {
        let timeout = self.config.fetch_timeout;
        self.spawn_stream(units, params, limit, cancel, Some(timeout))
    }

    fn spawn_stream(
        &self,
        units: Arc<Vec<TextUnit>>,
        params: SynthesisParams,
        limit: usize,
        cancel: CancelSignal,
        fetch_timeout: Option<Duration>,
    ) -> SynthesisStream {
        let limit = limit.max(1);
        let (tx, rx) = mpsc::channel::<UnitResult>(limit + 1);

        tracing::debug!(units = units.len(), limit, "Dispatching synthesis");

        let dispatcher = tokio::spawn(dispatch(self.clone(), units, params, limit, cancel.clone(), tx));

        SynthesisStream {
            rx,
            resequencer: Resequencer::new(),
            ready: VecDeque::new(),
            cancel,
            fetch_timeout,
            finished: false,
            dispatcher: Some(dispatcher),
        }
    }
}

/// Admit units one at a time under the request's limit, then wait for
/// every spawned worker before returning.
async fn dispatch(
    scheduler: ChunkScheduler,
    units: Arc<Vec<TextUnit>>,
    params: SynthesisParams,
    limit: usize,
    cancel: CancelSignal,
    tx: mpsc::Sender<UnitResult>,
) {
    let admission = Arc::new(Semaphore::new(limit));
    let mut workers = JoinSet::new();
    let mut dispatched = 0usize;

    for unit in units.iter() {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&admission).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if cancel.is_cancelled() {
            break;
        }

        let scheduler = scheduler.clone();
        let params = params.clone();
        let unit = unit.clone();
        let tx = tx.clone();
        workers.spawn(async move {
            let result = scheduler.synthesize_unit(&unit, &params).await;
            // Receiver gone means the request was abandoned
            let _ = tx.send((unit.index, result)).await;
            drop(permit);
        });
        dispatched += 1;
    }
    drop(tx);

    if dispatched < units.len() {
        tracing::debug!(dispatched, total = units.len(), "Dispatch stopped early");
    }

    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            tracing::warn!(error = %e, "Synthesis worker task failed");
        }
    }
}

/// Ordered stream of synthesized units for one request
pub struct SynthesisStream {
    rx: mpsc::Receiver<UnitResult>,
    resequencer: Resequencer<(usize, AudioBuffer)>,
    ready: VecDeque<(usize, AudioBuffer)>,
    cancel: CancelSignal,
    fetch_timeout: Option<Duration>,
    finished: bool,
    dispatcher: Option<JoinHandle<()>>,
}

impl SynthesisStream {
    /// Next unit in order as `(index, audio)`.
    ///
    /// Returns `None` once every unit was yielded or the stream was
    /// cancelled. A fatal error or timeout cancels the stream and is
    /// returned once.
    pub async fn next(&mut self) -> Option<Result<(usize, AudioBuffer)>> {
        let deadline = self.fetch_timeout.map(|t| Instant::now() + t);

        loop {
            if self.finished || self.cancel.is_cancelled() {
                return None;
            }
            if let Some(item) = self.ready.pop_front() {
                return Some(Ok(item));
            }

            let received = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                    Ok(received) => received,
                    Err(_) => {
                        let waited = self.fetch_timeout.unwrap_or_default();
                        tracing::warn!(
                            next_index = self.resequencer.next_index(),
                            waited_ms = waited.as_millis() as u64,
                            "Timed out waiting for synthesized unit"
                        );
                        self.fail();
                        return Some(Err(Error::StreamTimeout(waited)));
                    }
                },
                None => self.rx.recv().await,
            };

            match received {
                Some((index, Ok(audio))) => {
                    let released = self.resequencer.push(index, (index, audio));
                    self.ready.extend(released);
                }
                Some((index, Err(e))) => {
                    tracing::error!(index, error = %e, "Synthesis failed");
                    self.fail();
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    if self.resequencer.pending() > 0 {
                        tracing::debug!(
                            pending = self.resequencer.pending(),
                            "Stream ended with undelivered units"
                        );
                    }
                    return None;
                }
            }
        }
    }

    /// Signal shared with the dispatcher; cancelling it stops dispatch
    pub fn cancel_signal(&self) -> &CancelSignal {
        &self.cancel
    }

    /// Stop dispatching and wait for in-flight workers to finish
    pub async fn close(mut self) {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}

        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.await {
                tracing::warn!(error = %e, "Dispatcher task failed");
            }
        }
    }

    fn fail(&mut self) {
        self.finished = true;
        self.cancel.cancel();
    }
}

impl Drop for SynthesisStream {
    fn drop(&mut self) {
        // Dropped without close(): stop dispatch, workers finish on their own
        if self.dispatcher.is_some() {
            self.cancel.cancel();
        }
    }
}
