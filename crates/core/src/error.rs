//! Error types for the synthesis pipeline

use std::time::Duration;

use thiserror::Error;

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

/// Request-level synthesis errors
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Empty or otherwise unusable request input, rejected before segmentation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An engine handle for the locale could not be constructed
    #[error("Synthesis engine unavailable for locale '{locale}': {reason}")]
    SynthesisEngineUnavailable { locale: String, reason: String },

    /// A single unit failed; recovered locally, never returned to HTTP callers
    #[error("Synthesis failed for unit {index}: {source}")]
    UnitSynthesisFailure {
        index: usize,
        #[source]
        source: EngineError,
    },

    /// The next in-order unit did not arrive within the fetch timeout
    #[error("No audio chunk arrived within {0:?}")]
    StreamTimeout(Duration),

    #[error("Audio encoding error: {0}")]
    Audio(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Create an engine-unavailable error for a locale
    pub fn engine_unavailable(locale: impl Into<String>, reason: impl ToString) -> Self {
        Error::SynthesisEngineUnavailable {
            locale: locale.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<hound::Error> for Error {
    fn from(err: hound::Error) -> Self {
        Error::Audio(err.to_string())
    }
}

/// Engine-specific failures reported by a synthesis engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Unsupported locale: {0}")]
    UnsupportedLocale(String),

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Nothing to synthesize")]
    EmptyText,

    #[error("Engine produced no audio")]
    NoAudio,

    #[error("Engine backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::engine_unavailable("en-US", "model missing");
        assert_eq!(
            err.to_string(),
            "Synthesis engine unavailable for locale 'en-US': model missing"
        );

        let err = Error::StreamTimeout(Duration::from_secs(25));
        assert_eq!(err.to_string(), "No audio chunk arrived within 25s");
    }

    #[test]
    fn test_sub_second_timeout_message() {
        let err = Error::StreamTimeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "No audio chunk arrived within 250ms");
    }

    #[test]
    fn test_unit_failure_keeps_source() {
        let err = Error::UnitSynthesisFailure {
            index: 2,
            source: EngineError::NoAudio,
        };
        assert_eq!(err.to_string(), "Synthesis failed for unit 2: Engine produced no audio");
        assert!(std::error::Error::source(&err).is_some());
    }
}
