//! Prometheus metrics

use std::sync::OnceLock;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::state::AppState;
use crate::stats::StreamOutcome;
use crate::ServerError;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Metrics(e.to_string()))?;

    register_default_metrics();

    Ok(METRICS_HANDLE.get_or_init(|| handle).clone())
}

pub fn get_metrics_handle() -> Option<&'static PrometheusHandle> {
    METRICS_HANDLE.get()
}

fn register_default_metrics() {
    counter!("soulgate_requests_total", "endpoint" => "tts").absolute(0);
    counter!("soulgate_requests_total", "endpoint" => "tts_stream").absolute(0);

    counter!("soulgate_streams_total", "outcome" => "completed").absolute(0);
    counter!("soulgate_streams_total", "outcome" => "cancelled").absolute(0);
    counter!("soulgate_streams_total", "outcome" => "failed").absolute(0);
    counter!("soulgate_chunks_sent_total").absolute(0);

    histogram!("soulgate_synthesis_duration_seconds").record(0.0);
    gauge!("soulgate_audio_cache_entries").set(0.0);
}

pub fn record_request(endpoint: &'static str) {
    counter!("soulgate_requests_total", "endpoint" => endpoint).increment(1);
}

pub fn record_synthesis_latency(duration_secs: f64) {
    histogram!("soulgate_synthesis_duration_seconds").record(duration_secs);
}

pub fn record_chunk_sent() {
    counter!("soulgate_chunks_sent_total").increment(1);
}

pub fn record_stream_outcome(outcome: &StreamOutcome) {
    counter!("soulgate_streams_total", "outcome" => outcome.label()).increment(1);
}

pub fn record_cache_state(entries: usize, bytes: usize) {
    gauge!("soulgate_audio_cache_entries").set(entries as f64);
    gauge!("soulgate_audio_cache_bytes").set(bytes as f64);
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.audio_cache.snapshot();
    record_cache_state(snapshot.entries, snapshot.bytes);

    match get_metrics_handle() {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            handle.render(),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "text/plain")],
            "Metrics not enabled".to_string(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_helpers() {
        // No recorder installed; these are no-ops and must not panic
        record_request("tts");
        record_synthesis_latency(0.25);
        record_chunk_sent();
        record_stream_outcome(&StreamOutcome::Cancelled);
        record_cache_state(3, 1024);
    }
}
