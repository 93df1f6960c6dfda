//! HTTP Endpoints
//!
//! REST API for speech synthesis plus cache and statistics administration.

use std::time::Instant;

use axum::{
    body::Body,
    extract::{Json, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use soulgate_core::SynthesisParams;
use soulgate_transport::frame_channel;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::metrics::{metrics_handler, record_request, record_synthesis_latency};
use crate::state::AppState;
use crate::streaming;
use crate::voices::{self, LANG_MAPPING, VOICE_MAPPING};
use crate::ServerError;

const MIN_SPEED: f32 = 0.5;
const MAX_SPEED: f32 = 2.0;
const FRAME_BUFFER: usize = 2;

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let cors_enabled = state.settings.server.cors_enabled;

    let router = Router::new()
        .route("/", get(service_info))
        .route("/health", get(health_check))
        .route("/voices", get(list_voices))
        .route("/stats", get(get_stats))
        // Synthesis
        .route("/tts", post(synthesize))
        .route("/tts/stream", post(synthesize_stream))
        // Cache administration
        .route("/cache/stats", get(cache_stats))
        .route("/cache/clear", post(clear_cache))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http());

    let router = if cors_enabled {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}

/// Synthesis request body
#[derive(Debug, Clone, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Accepted for client compatibility; segmentation uses server bounds
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub max_chunk_words: Option<usize>,
}

fn default_lang() -> String {
    "a".to_string()
}
fn default_voice() -> String {
    "af_heart".to_string()
}
fn default_speed() -> f32 {
    1.0
}

impl TtsRequest {
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.text.trim().is_empty() {
            return Err(ServerError::InvalidRequest("Text must not be empty".to_string()));
        }
        if !(MIN_SPEED..=MAX_SPEED).contains(&self.speed) {
            return Err(ServerError::InvalidRequest(format!(
                "Speed must be between {} and {}",
                MIN_SPEED, MAX_SPEED
            )));
        }
        Ok(())
    }

    pub fn params(&self) -> SynthesisParams {
        let resolved = voices::resolve(&self.voice, &self.lang);
        SynthesisParams::new(resolved.voice, resolved.locale, self.speed)
    }
}

/// `POST /tts`: complete WAV asset
async fn synthesize(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, ServerError> {
    request.validate()?;

    state.stats.record_request();
    record_request("tts");

    let params = request.params();
    let started = Instant::now();
    tracing::info!(
        voice = %params.voice,
        locale = %params.locale,
        speed = params.speed,
        chars = request.text.chars().count(),
        "TTS request"
    );

    let result = async {
        let units = state
            .segmenter
            .segment(&request.text, state.settings.synthesis.max_unit_chars);
        let limit = state.scheduler.concurrency_for(units.len());
        let audio = state.scheduler.synthesize(units, params, limit).await?;
        Ok::<_, ServerError>(audio.to_wav()?)
    }
    .await;

    match result {
        Ok(wav) => {
            state.stats.record_success();
            record_synthesis_latency(started.elapsed().as_secs_f64());
            tracing::info!(bytes = wav.len(), elapsed_ms = started.elapsed().as_millis() as u64, "TTS complete");
            Ok(([(header::CONTENT_TYPE, "audio/wav")], wav).into_response())
        }
        Err(e) => {
            state.stats.record_failure();
            Err(e)
        }
    }
}

/// `POST /tts/stream`: multipart stream of WAV fragments
async fn synthesize_stream(
    State(state): State<AppState>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, ServerError> {
    request.validate()?;

    state.stats.record_stream_request();
    record_request("tts_stream");

    let params = request.params();
    let (writer, body) = frame_channel(FRAME_BUFFER);
    tokio::spawn(streaming::drive(
        state.clone(),
        request.text,
        params,
        writer,
        soulgate_pipeline::CancelSignal::new(),
    ));

    Ok((
        [(header::CONTENT_TYPE, soulgate_transport::content_type())],
        Body::from_stream(body),
    )
        .into_response())
}

async fn service_info(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "ok": true,
        "service": "soulgate-tts",
        "version": env!("CARGO_PKG_VERSION"),
        "engine": state.settings.engine.backend,
        "endpoints": [
            "POST /tts",
            "POST /tts/stream",
            "GET /voices",
            "GET /health",
            "GET /stats",
            "GET /cache/stats",
            "POST /cache/clear",
            "GET /metrics"
        ],
    }))
}

/// Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.snapshot();
    let cache = state.audio_cache.snapshot();

    Json(serde_json::json!({
        "status": "healthy",
        "engine": state.settings.engine.backend,
        "memory": {
            "cache_bytes": cache.bytes,
            "cache_mb": (cache.bytes as f64 / (1024.0 * 1024.0) * 10.0).round() / 10.0,
            "cache_entries": cache.entries,
        },
        "stats": {
            "total_requests": stats.total_requests,
            "stream_requests": stats.stream_requests,
            "successful_streams": stats.successful_streams,
            "chunks_sent": stats.chunks_sent,
        },
    }))
}

async fn list_voices() -> impl IntoResponse {
    let by_locale = voices::voices_by_locale();
    let total: usize = by_locale.values().map(Vec::len).sum();

    Json(serde_json::json!({
        "total_voices": total,
        "by_locale": by_locale,
        "kokoro_mapping": *VOICE_MAPPING,
    }))
}

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "engine": state.settings.engine.backend,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "stats": state.stats.snapshot(),
        "cache": state.audio_cache.snapshot(),
        "engines_loaded": state.engines.locales(),
        "voice_mapping": *VOICE_MAPPING,
        "supported_languages": LANG_MAPPING.keys().collect::<Vec<_>>(),
    }))
}

async fn cache_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "audio": state.audio_cache.snapshot(),
        "segmentations": state.segmenter.len(),
        "engine_handles": {
            "loaded": state.engines.size(),
            "max": state.settings.engine.max_handles,
            "locales": state.engines.locales(),
        },
        "worker_pool": {
            "size": state.scheduler.pool().size(),
            "available": state.scheduler.pool().available(),
        },
    }))
}

async fn clear_cache(State(state): State<AppState>) -> impl IntoResponse {
    let cleared = state.clear_caches();
    Json(serde_json::json!({
        "cleared": cleared,
        "audio": state.audio_cache.snapshot(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use soulgate_config::Settings;

    fn request(text: &str, speed: f32) -> TtsRequest {
        TtsRequest {
            text: text.to_string(),
            lang: default_lang(),
            voice: default_voice(),
            speed,
            chunk_size: None,
            max_chunk_words: None,
        }
    }

    #[test]
    fn test_router_creation() {
        let state = AppState::new(Settings::default());
        let _ = create_router(state);
    }

    #[test]
    fn test_request_validation() {
        assert!(request("Hello", 1.0).validate().is_ok());
        assert!(matches!(
            request("   ", 1.0).validate(),
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(request("Hello", 0.4).validate().is_err());
        assert!(request("Hello", 2.5).validate().is_err());
        assert!(request("Hello", 2.0).validate().is_ok());
    }

    #[test]
    fn test_request_defaults_resolve_voice() {
        let parsed: TtsRequest = serde_json::from_str(r#"{"text": "hi", "chunk_size": 50}"#).unwrap();
        assert_eq!(parsed.lang, "a");
        assert_eq!(parsed.voice, "af_heart");
        assert_eq!(parsed.speed, 1.0);

        let params = parsed.params();
        assert_eq!(params.voice, "en-US-JennyNeural");
        assert_eq!(params.locale, "en-US");
    }
}
