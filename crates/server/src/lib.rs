//! Soulgate TTS Server
//!
//! HTTP endpoints for complete and streamed speech synthesis.

pub mod http;
pub mod metrics;
pub mod state;
pub mod stats;
pub mod streaming;
pub mod voices;

pub use http::{create_router, TtsRequest};
pub use self::metrics::{init_metrics, metrics_handler};
pub use state::AppState;
pub use stats::{RequestStats, StatsSnapshot};

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Request body failed validation
    #[error("{0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Synthesis(#[from] soulgate_core::Error),

    #[error("Metrics error: {0}")]
    Metrics(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::Synthesis(soulgate_core::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ServerError::Synthesis(_) | ServerError::Metrics(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            ServerError::Synthesis(soulgate_core::Error::InvalidInput(msg)) => msg.clone(),
            ServerError::Synthesis(e) => format!("Synthesis error: {}", e),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "detail": self.detail() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let err = ServerError::InvalidRequest("Text must not be empty".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "Text must not be empty");

        let err = ServerError::from(soulgate_core::Error::invalid_input("no text to synthesize"));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.detail(), "no text to synthesize");

        let err = ServerError::from(soulgate_core::Error::engine_unavailable("en-US", "down"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.detail().starts_with("Synthesis error: "));
    }
}
