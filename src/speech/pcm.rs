//! Raw PCM decoding and the decoded audio buffer.

use std::time::Duration;

/// Sample rate of synthesized speech.
pub const SPEECH_SAMPLE_RATE: u32 = 24_000;

/// Decoded mono audio.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap decoded samples.
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Samples in `[-1.0, 1.0)`.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Frames per second.
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Playback length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        let frames = u64::try_from(self.samples.len()).unwrap_or(u64::MAX);
        Duration::from_nanos(
            frames.saturating_mul(1_000_000_000) / u64::from(self.sample_rate),
        )
    }

    /// Index of the frame at `offset`, clamped to the buffer.
    #[must_use]
    pub fn frame_at(&self, offset: Duration) -> usize {
        let frame = offset.as_nanos() * u128::from(self.sample_rate) / 1_000_000_000;
        usize::try_from(frame).map_or(self.samples.len(), |f| f.min(self.samples.len()))
    }
}

/// Decode little-endian signed 16-bit PCM into normalized samples.
///
/// The format carries no header, so the caller supplies the sample rate.
/// A trailing odd byte is ignored.
#[must_use]
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32) -> AudioBuffer {
    let samples = bytes
        .chunks_exact(2)
        .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32768.0)
        .collect();
    AudioBuffer::new(samples, sample_rate)
}
