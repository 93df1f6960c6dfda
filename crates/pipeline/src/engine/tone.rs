//! Built-in deterministic engine
//!
//! Renders each word as a short sine burst. Pitch is derived from the
//! voice name and durations scale with `1/speed`, so output is stable for
//! a given input and useful for exercising the pipeline end to end.

use std::f32::consts::PI;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use soulgate_core::{AudioBuffer, EngineError};

use super::{EngineFactory, EngineHandle, SynthesisEngine};

static LOCALE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{2,8})*$").unwrap());

const BASE_WORD_MS: f32 = 60.0;
const PER_CHAR_MS: f32 = 12.0;
const GAP_MS: f32 = 40.0;
const FADE_MS: f32 = 5.0;
const AMPLITUDE: f32 = 0.3;

/// Factory producing one [`ToneEngine`] per locale
#[derive(Debug, Clone)]
pub struct ToneEngineFactory {
    sample_rate: u32,
}

impl ToneEngineFactory {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

#[async_trait::async_trait]
impl EngineFactory for ToneEngineFactory {
    async fn create(&self, locale: &str) -> Result<EngineHandle, EngineError> {
        let engine = ToneEngine::new(locale, self.sample_rate)?;
        tracing::debug!(locale, sample_rate = self.sample_rate, "Created tone engine");
        Ok(Arc::new(engine))
    }
}

#[derive(Debug)]
pub struct ToneEngine {
    locale: String,
    sample_rate: u32,
}

impl ToneEngine {
    pub fn new(locale: &str, sample_rate: u32) -> Result<Self, EngineError> {
        if !LOCALE_TAG.is_match(locale) {
            return Err(EngineError::UnsupportedLocale(locale.to_string()));
        }
        Ok(Self {
            locale: locale.to_string(),
            sample_rate,
        })
    }

    /// Base pitch between 110 and 330 Hz, fixed per voice
    fn pitch_for(voice: &str) -> f32 {
        // FNV-1a
        let mut hash: u32 = 0x811c_9dc5;
        for byte in voice.bytes() {
            hash ^= byte as u32;
            hash = hash.wrapping_mul(0x0100_0193);
        }
        110.0 + (hash % 221) as f32
    }

    fn ms_to_samples(&self, ms: f32) -> usize {
        (ms * self.sample_rate as f32 / 1000.0).round() as usize
    }

    fn render_word(&self, word: &str, pitch: f32, speed: f32, out: &mut Vec<f32>) {
        let chars = word.chars().count() as f32;
        let len = self.ms_to_samples((BASE_WORD_MS + PER_CHAR_MS * chars) / speed);
        let fade = self.ms_to_samples(FADE_MS).min(len / 2).max(1);

        // Rising inflection on questions, falling elsewhere
        let glide = if word.ends_with('?') { 1.08 } else { 0.97 };
        let rate = self.sample_rate as f32;

        for i in 0..len {
            let progress = i as f32 / len.max(1) as f32;
            let freq = pitch * (1.0 + (glide - 1.0) * progress);
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i >= len - fade {
                (len - i) as f32 / fade as f32
            } else {
                1.0
            };
            out.push(AMPLITUDE * envelope * (2.0 * PI * freq * i as f32 / rate).sin());
        }
    }
}

impl SynthesisEngine for ToneEngine {
    fn locale(&self) -> &str {
        &self.locale
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn synthesize(&self, text: &str, voice: &str, speed: f32) -> Result<AudioBuffer, EngineError> {
        if voice.trim().is_empty() {
            return Err(EngineError::UnknownVoice(voice.to_string()));
        }
        if !(speed.is_finite() && speed > 0.0) {
            return Err(EngineError::Backend(format!("invalid speed {}", speed)));
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Err(EngineError::EmptyText);
        }

        let pitch = Self::pitch_for(voice);
        let gap = self.ms_to_samples(GAP_MS / speed);
        let mut samples = Vec::new();

        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                samples.resize(samples.len() + gap, 0.0);
            }
            self.render_word(word, pitch, speed, &mut samples);
        }

        if samples.is_empty() {
            return Err(EngineError::NoAudio);
        }

        Ok(AudioBuffer::new(samples, self.sample_rate))
    }
}
