//! Audio buffers produced by synthesis engines

use std::io::Cursor;
use std::sync::Arc;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::Result;

/// Mono f32 samples at a fixed sample rate.
///
/// Samples are shared behind an `Arc` so cached audio can be handed to
/// concurrent readers without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Zero-valued buffer lasting `duration_ms`
    pub fn silence(duration_ms: u32, sample_rate: u32) -> Self {
        let len = (sample_rate as u64 * duration_ms as u64 / 1000) as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Join buffers in order.
    ///
    /// Every part is expected at the same rate; the first part's rate wins,
    /// or `fallback_rate` when `parts` is empty.
    pub fn concat(parts: &[AudioBuffer], fallback_rate: u32) -> Self {
        let sample_rate = parts.first().map(|p| p.sample_rate).unwrap_or(fallback_rate);
        let total: usize = parts.iter().map(|p| p.samples.len()).sum();

        let mut samples = Vec::with_capacity(total);
        for part in parts {
            samples.extend_from_slice(&part.samples);
        }

        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        self.samples.len() as u64 * 1000 / self.sample_rate as u64
    }

    /// Approximate in-memory size
    pub fn byte_size(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>()
    }

    /// Encode as a 16-bit PCM mono WAV file
    pub fn to_wav(&self) -> Result<Vec<u8>> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + self.samples.len() * 2));
        {
            let mut writer = WavWriter::new(&mut cursor, spec)?;
            for &sample in self.samples.iter() {
                let clamped = sample.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_length() {
        let silence = AudioBuffer::silence(100, 24000);
        assert_eq!(silence.len(), 2400);
        assert!(silence.samples().iter().all(|&s| s == 0.0));
        assert_eq!(silence.duration_ms(), 100);
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = AudioBuffer::new(vec![0.1, 0.2], 16000);
        let b = AudioBuffer::new(vec![0.3], 16000);
        let joined = AudioBuffer::concat(&[a, b], 24000);
        assert_eq!(joined.samples(), &[0.1, 0.2, 0.3]);
        assert_eq!(joined.sample_rate(), 16000);

        let empty = AudioBuffer::concat(&[], 24000);
        assert!(empty.is_empty());
        assert_eq!(empty.sample_rate(), 24000);
    }

    #[test]
    fn test_wav_encoding() {
        let audio = AudioBuffer::new(vec![0.0, 0.5, -0.5, 2.0], 24000);
        let wav = audio.to_wav().unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(wav.len(), 44 + 4 * 2);

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded[3], i16::MAX);
    }
}
