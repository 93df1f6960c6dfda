//! Core types for the TTS server
//!
//! This crate provides foundational types used across all other crates:
//! - Audio buffers and WAV encoding
//! - Text units and synthesis parameters
//! - Error types

pub mod audio;
pub mod error;
pub mod params;

pub use audio::AudioBuffer;
pub use error::{EngineError, Error, Result};
pub use params::{CacheKey, SynthesisParams, TextUnit};
