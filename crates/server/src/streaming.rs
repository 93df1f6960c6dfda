//! Streamed synthesis responses
//!
//! One background task per request drives the scheduler's ordered stream
//! into the multipart body and stops on client disconnect. The terminator is
//! written and the body closed before in-flight engine calls are drained, so
//! a stalled unit never holds the response open past the fetch timeout.

use std::time::{Duration, Instant};

use soulgate_core::SynthesisParams;
use soulgate_pipeline::{CancelSignal, SynthesisStream};
use soulgate_transport::{DisconnectProbe, FrameWriter};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::metrics::{record_chunk_sent, record_stream_outcome, record_synthesis_latency};
use crate::state::AppState;
use crate::stats::StreamOutcome;

const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Produce the whole streamed body for one request.
///
/// `cancel` may be set from outside; the disconnect watcher sets it too.
pub async fn drive(
    state: AppState,
    text: String,
    params: SynthesisParams,
    mut writer: FrameWriter,
    cancel: CancelSignal,
) {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("tts_stream", %request_id, voice = %params.voice);

    async move {
        let started = Instant::now();
        let (outcome, in_flight) = run(&state, &text, params, &mut writer, &cancel).await;

        if let StreamOutcome::Failed(message) = &outcome {
            if let Err(e) = writer.send_error(message).await {
                tracing::debug!(error = %e, "Error fragment not delivered");
            }
        }
        if let Err(e) = writer.finish().await {
            tracing::debug!(error = %e, "Terminator not delivered");
        }

        // Ends the body; the watcher's probe is already gone
        let chunks = writer.fragments_sent();
        drop(writer);

        if let Some(stream) = in_flight {
            stream.close().await;
        }

        state.stats.record_stream_end(&outcome, chunks);
        record_stream_outcome(&outcome);

        match &outcome {
            StreamOutcome::Completed => {
                record_synthesis_latency(started.elapsed().as_secs_f64());
                tracing::info!(chunks, elapsed_ms = started.elapsed().as_millis() as u64, "Stream completed");
            }
            StreamOutcome::Cancelled => tracing::info!(chunks, "Stream cancelled"),
            StreamOutcome::Failed(message) => tracing::warn!(chunks, error = %message, "Stream failed"),
        }
    }
    .instrument(span)
    .await
}

/// Stream every unit into `writer`.
///
/// Returns the scheduler stream, still undrained, whenever synthesis was
/// started; the caller closes it after the body has ended.
async fn run(
    state: &AppState,
    text: &str,
    params: SynthesisParams,
    writer: &mut FrameWriter,
    cancel: &CancelSignal,
) -> (StreamOutcome, Option<SynthesisStream>) {
    if let Err(e) = writer.begin_segmenting() {
        return (StreamOutcome::Failed(e.to_string()), None);
    }
    let units = state
        .segmenter
        .segment(text, state.settings.synthesis.stream_max_unit_chars);
    if units.is_empty() {
        return (StreamOutcome::Failed("no text to synthesize".to_string()), None);
    }

    if let Err(e) = writer.begin_streaming() {
        return (StreamOutcome::Failed(e.to_string()), None);
    }

    let poll = Duration::from_millis(state.settings.synthesis.disconnect_poll_ms.max(1));
    let watcher = spawn_disconnect_watcher(writer.probe(), cancel.clone(), poll);

    let total = units.len();
    let limit = state.scheduler.concurrency_for(total);
    tracing::info!(units = total, limit, "Streaming synthesis");

    let stream = state.scheduler.stream(units, params, limit, cancel.clone());
    let (outcome, stream) = forward(stream, writer, cancel).await;

    // Stops dispatch and the watcher
    cancel.cancel();
    if let Err(e) = watcher.await {
        tracing::warn!(error = %e, "Disconnect watcher failed");
    }

    (outcome, Some(stream))
}

/// Copy units from the scheduler into the body until done, failed or cancelled
async fn forward(
    mut stream: SynthesisStream,
    writer: &mut FrameWriter,
    cancel: &CancelSignal,
) -> (StreamOutcome, SynthesisStream) {
    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break StreamOutcome::Cancelled,
            next = stream.next() => next,
        };

        let (index, audio) = match next {
            Some(Ok(item)) => item,
            Some(Err(e)) => break StreamOutcome::Failed(e.to_string()),
            None if cancel.is_cancelled() => break StreamOutcome::Cancelled,
            None => break StreamOutcome::Completed,
        };

        let wav = match audio.to_wav() {
            Ok(wav) => wav,
            Err(e) => break StreamOutcome::Failed(e.to_string()),
        };

        if writer.send_fragment(AUDIO_CONTENT_TYPE, &wav).await.is_err() {
            tracing::info!(index, "Client disconnected");
            break StreamOutcome::Cancelled;
        }
        record_chunk_sent();
        tracing::debug!(index, bytes = wav.len(), duration_ms = audio.duration_ms(), "Sent chunk");
    };

    (outcome, stream)
}

/// Poll for a dropped body and cancel the request when it happens
fn spawn_disconnect_watcher(probe: DisconnectProbe, cancel: CancelSignal, poll: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(poll);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if probe.is_disconnected() {
                        tracing::info!("Client disconnected, cancelling synthesis");
                        cancel.cancel();
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use futures::StreamExt;
    use soulgate_config::Settings;
    use soulgate_core::{AudioBuffer, EngineError};
    use soulgate_pipeline::{EngineFactory, EngineHandle, SynthesisEngine};
    use soulgate_transport::{frame_channel, FrameStream};

    const TERMINATOR: &[u8] = b"--frame--\r\n";

    /// Engine that takes a fixed time per unit and counts calls
    struct PacedEngine {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl PacedEngine {
        fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SynthesisEngine for PacedEngine {
        fn locale(&self) -> &str {
            "en-US"
        }

        fn sample_rate(&self) -> u32 {
            24000
        }

        fn synthesize(&self, _text: &str, _voice: &str, _speed: f32) -> Result<AudioBuffer, EngineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(AudioBuffer::new(vec![0.1; 240], 24000))
        }
    }

    struct PacedFactory(Arc<PacedEngine>);

    #[async_trait::async_trait]
    impl EngineFactory for PacedFactory {
        async fn create(&self, _locale: &str) -> Result<EngineHandle, EngineError> {
            let engine: EngineHandle = self.0.clone();
            Ok(engine)
        }
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.synthesis.stream_max_unit_chars = 25;
        settings
    }

    fn state() -> AppState {
        AppState::new(settings())
    }

    fn paced_state(settings: Settings, engine: &Arc<PacedEngine>) -> AppState {
        AppState::with_factory(settings, Arc::new(PacedFactory(Arc::clone(engine))))
    }

    fn params() -> SynthesisParams {
        SynthesisParams::new("en-US-JennyNeural", "en-US", 1.0)
    }

    async fn frames(mut body: FrameStream) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        while let Some(Ok(frame)) = body.next().await {
            out.push(frame);
        }
        out
    }

    #[tokio::test]
    async fn test_stream_ends_with_terminator() {
        let state = state();
        let (writer, body) = frame_channel(4);
        let text = "First sentence here. Second sentence here. Third one.".to_string();

        let task = tokio::spawn(drive(state.clone(), text, params(), writer, CancelSignal::new()));
        let frames = frames(body).await;
        task.await.unwrap();

        let (last, audio) = frames.split_last().unwrap();
        assert_eq!(last, TERMINATOR);
        assert_eq!(audio.len(), 3);
        for frame in audio {
            assert!(frame.starts_with(b"--frame\r\nContent-Type: audio/wav\r\n"));
        }

        let stats = state.stats.snapshot();
        assert_eq!(stats.successful_streams, 1);
        assert_eq!(stats.chunks_sent, 3);
    }

    #[tokio::test]
    async fn test_engine_failure_emits_error_fragment() {
        let state = state();
        let (writer, body) = frame_channel(4);
        let bad = SynthesisParams::new("voice", "not a locale", 1.0);

        let task = tokio::spawn(drive(state.clone(), "Hello there.".into(), bad, writer, CancelSignal::new()));
        let frames = frames(body).await;
        task.await.unwrap();

        assert_eq!(frames.len(), 2);
        let error = String::from_utf8(frames[0].clone()).unwrap();
        assert!(error.contains("Content-Type: text/plain; charset=utf-8"));
        assert!(error.contains("Error: Synthesis engine unavailable"));
        assert_eq!(frames[1], TERMINATOR);
        assert_eq!(state.stats.snapshot().failed_streams, 1);
    }

    #[tokio::test]
    async fn test_pre_cancelled_stream_still_terminates() {
        let state = state();
        let (writer, body) = frame_channel(4);
        let cancel = CancelSignal::new();
        cancel.cancel();

        let task = tokio::spawn(drive(state.clone(), "Hello there.".into(), params(), writer, cancel));
        let frames = frames(body).await;
        task.await.unwrap();

        assert_eq!(frames, vec![TERMINATOR.to_vec()]);
        assert_eq!(state.stats.snapshot().cancelled_streams, 1);
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_stops_dispatch_and_terminates() {
        let engine = PacedEngine::new(Duration::from_millis(200));
        let mut settings = settings();
        settings.synthesis.worker_pool_size = 4;
        let state = paced_state(settings, &engine);

        let text = "Unit one is here. Unit two is here. Unit three is here. \
                    Unit four is here. Unit five is here.";
        let limit = state.scheduler.concurrency_for(5);
        let (writer, mut body) = frame_channel(4);
        let cancel = CancelSignal::new();

        let task = tokio::spawn(drive(state.clone(), text.into(), params(), writer, cancel.clone()));

        for _ in 0..2 {
            let frame = body.next().await.unwrap().unwrap();
            assert!(frame.starts_with(b"--frame\r\nContent-Type: audio/wav\r\n"));
        }
        cancel.cancel();

        let rest = frames(body).await;
        task.await.unwrap();

        assert_eq!(rest, vec![TERMINATOR.to_vec()]);
        assert!(
            engine.calls() <= 2 + limit,
            "calls = {}, limit = {}",
            engine.calls(),
            limit
        );

        let stats = state.stats.snapshot();
        assert_eq!(stats.cancelled_streams, 1);
        assert_eq!(stats.chunks_sent, 2);
    }

    #[tokio::test]
    async fn test_timeout_terminates_before_stalled_unit_returns() {
        let engine = PacedEngine::new(Duration::from_secs(3));
        let mut settings = settings();
        settings.synthesis.fetch_timeout_secs = 1;
        let state = paced_state(settings, &engine);

        let started = std::time::Instant::now();
        let (writer, body) = frame_channel(4);
        let task = tokio::spawn(drive(state.clone(), "Hello there.".into(), params(), writer, CancelSignal::new()));

        let frames = frames(body).await;
        let body_closed = started.elapsed();

        assert!(body_closed < Duration::from_millis(2500), "body closed after {:?}", body_closed);
        assert_eq!(frames.len(), 2);
        let error = String::from_utf8(frames[0].clone()).unwrap();
        assert!(error.contains("Error: No audio chunk arrived within 1s"), "{}", error);
        assert_eq!(frames[1], TERMINATOR);

        // The stalled call is still drained before the task exits
        task.await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(3));
        assert_eq!(engine.calls(), 1);
        assert_eq!(state.stats.snapshot().failed_streams, 1);
    }

    #[tokio::test]
    async fn test_dropped_body_cancels() {
        let state = state();
        let (writer, body) = frame_channel(1);
        drop(body);

        let text = "One two three four. Five six seven eight. Nine ten.".to_string();
        tokio::time::timeout(
            Duration::from_secs(5),
            drive(state.clone(), text, params(), writer, CancelSignal::new()),
        )
        .await
        .unwrap();

        let stats = state.stats.snapshot();
        assert_eq!(stats.cancelled_streams, 1);
        assert_eq!(stats.chunks_sent, 0);
    }
}
