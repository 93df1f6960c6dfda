//! Integration tests for ordered, concurrency-limited synthesis
//!
//! A scripted engine lets each test control per-unit latency and failures.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use soulgate_core::{AudioBuffer, EngineError, Error, SynthesisParams, TextUnit};
use soulgate_pipeline::{
    AudioCache, CancelSignal, ChunkScheduler, EngineCache, EngineFactory, EngineHandle,
    SchedulerConfig, SynthesisEngine, WorkerPool,
};

const RATE: u32 = 24000;
const MARKER_LEN: usize = 10;

/// Units named `u<N>` render `MARKER_LEN` samples of value N
#[derive(Default)]
struct ScriptedEngine {
    delays_ms: HashMap<String, u64>,
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl ScriptedEngine {
    fn with_delays(delays: &[(&str, u64)]) -> Self {
        Self {
            delays_ms: delays.iter().map(|(t, d)| (t.to_string(), *d)).collect(),
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SynthesisEngine for ScriptedEngine {
    fn locale(&self) -> &str {
        "en-US"
    }

    fn sample_rate(&self) -> u32 {
        RATE
    }

    fn synthesize(&self, text: &str, _voice: &str, _speed: f32) -> Result<AudioBuffer, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.delays_ms.get(text) {
            std::thread::sleep(Duration::from_millis(*ms));
        }
        if self.failing.contains(text) {
            return Err(EngineError::Backend(format!("scripted failure for {}", text)));
        }
        let marker: f32 = text.trim_start_matches('u').parse().unwrap_or(-1.0);
        Ok(AudioBuffer::new(vec![marker; MARKER_LEN], RATE))
    }
}

struct ScriptedFactory {
    engine: Arc<ScriptedEngine>,
}

#[async_trait::async_trait]
impl EngineFactory for ScriptedFactory {
    async fn create(&self, locale: &str) -> Result<EngineHandle, EngineError> {
        if locale == "xx-BAD" {
            return Err(EngineError::UnsupportedLocale(locale.to_string()));
        }
        let engine: EngineHandle = self.engine.clone();
        Ok(engine)
    }
}

fn scheduler(engine: &Arc<ScriptedEngine>, fetch_timeout: Duration) -> ChunkScheduler {
    let factory = Arc::new(ScriptedFactory {
        engine: Arc::clone(engine),
    });
    ChunkScheduler::new(
        Arc::new(EngineCache::new(factory, 5)),
        Arc::new(AudioCache::new(100, Duration::from_secs(60), 0.2)),
        WorkerPool::new(8),
        SchedulerConfig {
            fetch_timeout,
            silence_ms: 100,
            max_concurrency: 6,
        },
    )
}

fn units(texts: &[&str]) -> Arc<Vec<TextUnit>> {
    Arc::new(
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| TextUnit::new(i, *t))
            .collect(),
    )
}

fn params() -> SynthesisParams {
    SynthesisParams::new("en-US-JennyNeural", "en-US", 1.0)
}

#[tokio::test]
async fn test_stream_order_under_reverse_delays() {
    let engine = Arc::new(ScriptedEngine::with_delays(&[
        ("u0", 200),
        ("u1", 160),
        ("u2", 120),
        ("u3", 80),
        ("u4", 40),
    ]));
    let scheduler = scheduler(&engine, Duration::from_secs(5));

    let mut stream = scheduler.stream(
        units(&["u0", "u1", "u2", "u3", "u4"]),
        params(),
        5,
        CancelSignal::new(),
    );

    let mut seen = Vec::new();
    while let Some(item) = stream.next().await {
        let (index, audio) = item.unwrap();
        assert_eq!(audio.samples()[0], index as f32);
        seen.push(index);
    }
    stream.close().await;

    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_later_unit_finishing_first_is_held_back() {
    // Limit 2: u0 is slow, so u2 completes before it
    let engine = Arc::new(ScriptedEngine::with_delays(&[("u0", 300), ("u1", 10)]));
    let scheduler = scheduler(&engine, Duration::from_secs(5));

    let mut stream = scheduler.stream(
        units(&["u0", "u1", "u2", "u3", "u4"]),
        params(),
        2,
        CancelSignal::new(),
    );

    let mut seen = Vec::new();
    while let Some(item) = stream.next().await {
        seen.push(item.unwrap().0);
    }
    stream.close().await;

    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(engine.calls(), 5);
}

#[tokio::test]
async fn test_batch_concatenates_in_order() {
    let engine = Arc::new(ScriptedEngine::with_delays(&[("u0", 80), ("u2", 5)]));
    let scheduler = scheduler(&engine, Duration::from_secs(5));

    let audio = scheduler
        .synthesize(units(&["u0", "u1", "u2"]), params(), 3)
        .await
        .unwrap();

    assert_eq!(audio.len(), 3 * MARKER_LEN);
    assert_eq!(audio.sample_rate(), RATE);
    assert_eq!(audio.samples()[0], 0.0);
    assert_eq!(audio.samples()[MARKER_LEN], 1.0);
    assert_eq!(audio.samples()[2 * MARKER_LEN], 2.0);
}

#[tokio::test]
async fn test_failing_unit_becomes_silence() {
    let engine = Arc::new(ScriptedEngine {
        failing: ["u1".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let scheduler = scheduler(&engine, Duration::from_secs(5));

    let audio = scheduler
        .synthesize(units(&["u0", "u1", "u2"]), params(), 2)
        .await
        .unwrap();

    // 100ms at 24kHz in place of the failed unit
    let silence = 2400;
    assert_eq!(audio.len(), 2 * MARKER_LEN + silence);
    assert!(audio.samples()[MARKER_LEN..MARKER_LEN + silence]
        .iter()
        .all(|&s| s == 0.0));
    assert_eq!(audio.samples()[MARKER_LEN + silence], 2.0);
}

#[tokio::test]
async fn test_repeat_request_served_from_cache() {
    let engine = Arc::new(ScriptedEngine::default());
    let scheduler = scheduler(&engine, Duration::from_secs(5));

    let first = scheduler
        .synthesize(units(&["u0", "u1"]), params(), 2)
        .await
        .unwrap();
    let second = scheduler
        .synthesize(units(&["u0", "u1"]), params(), 2)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(engine.calls(), 2);

    // Different speed is a different key
    let faster = SynthesisParams::new("en-US-JennyNeural", "en-US", 1.5);
    scheduler.synthesize(units(&["u0"]), faster, 1).await.unwrap();
    assert_eq!(engine.calls(), 3);
}

#[tokio::test]
async fn test_engine_unavailable_fails_request() {
    let engine = Arc::new(ScriptedEngine::default());
    let scheduler = scheduler(&engine, Duration::from_secs(5));
    let bad = SynthesisParams::new("voice", "xx-BAD", 1.0);

    let err = scheduler
        .synthesize(units(&["u0", "u1"]), bad.clone(), 2)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::SynthesisEngineUnavailable { .. }));

    let mut stream = scheduler.stream(units(&["u0"]), bad, 1, CancelSignal::new());
    assert!(matches!(
        stream.next().await,
        Some(Err(Error::SynthesisEngineUnavailable { .. }))
    ));
    assert!(stream.next().await.is_none());
    stream.close().await;
    assert_eq!(engine.calls(), 0);
}

#[tokio::test]
async fn test_cancel_stops_dispatch() {
    let delays: Vec<(&str, u64)> = ["u0", "u1", "u2", "u3", "u4"]
        .iter()
        .map(|t| (*t, 100))
        .collect();
    let engine = Arc::new(ScriptedEngine::with_delays(&delays));
    let scheduler = scheduler(&engine, Duration::from_secs(5));
    let cancel = CancelSignal::new();

    let mut stream = scheduler.stream(
        units(&["u0", "u1", "u2", "u3", "u4"]),
        params(),
        1,
        cancel.clone(),
    );

    assert_eq!(stream.next().await.unwrap().unwrap().0, 0);
    assert_eq!(stream.next().await.unwrap().unwrap().0, 1);
    cancel.cancel();

    assert!(stream.next().await.is_none());
    stream.close().await;

    // At most the unit admitted alongside index 1 was started
    assert!(engine.calls() <= 3, "calls = {}", engine.calls());
}

#[tokio::test]
async fn test_fetch_timeout_ends_stream() {
    let engine = Arc::new(ScriptedEngine::with_delays(&[("u0", 400)]));
    let scheduler = scheduler(&engine, Duration::from_millis(50));

    let mut stream = scheduler.stream(units(&["u0", "u1"]), params(), 2, CancelSignal::new());

    match stream.next().await {
        Some(Err(Error::StreamTimeout(waited))) => assert_eq!(waited, Duration::from_millis(50)),
        other => panic!("expected timeout, got {:?}", other.map(|r| r.map(|(i, _)| i))),
    }
    assert!(stream.next().await.is_none());
    assert!(stream.cancel_signal().is_cancelled());

    // Waits for the slow worker instead of abandoning it
    tokio::time::timeout(Duration::from_secs(2), stream.close())
        .await
        .unwrap();
}
