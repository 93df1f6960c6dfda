//! Text units, synthesis parameters and cache keys

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// One bounded piece of request text, tagged with its position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TextUnit {
    pub index: usize,
    pub text: String,
}

impl TextUnit {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Voice, locale and speed applied to every unit of a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisParams {
    pub voice: String,
    pub locale: String,
    pub speed: f32,
}

impl SynthesisParams {
    pub fn new(voice: impl Into<String>, locale: impl Into<String>, speed: f32) -> Self {
        Self {
            voice: voice.into(),
            locale: locale.into(),
            speed,
        }
    }
}

/// Hex SHA-256 digest identifying one synthesized unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(text: &str, params: &SynthesisParams) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update([0u8]);
        hasher.update(params.voice.as_bytes());
        hasher.update([0u8]);
        hasher.update(params.locale.as_bytes());
        hasher.update([0u8]);
        hasher.update(params.speed.to_bits().to_le_bytes());

        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
