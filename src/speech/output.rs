//! Audio sinks for the player.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{debug, warn};

use super::pcm::AudioBuffer;

/// Where played samples go.
pub trait AudioOutput: Send + Sync {
    /// Begin emitting `buffer` from frame `from_frame`.
    fn start(&self, buffer: &AudioBuffer, from_frame: usize);
    /// Stop emitting. Called even when nothing is playing.
    fn halt(&self);
}

/// Output that discards samples. Playback is timed only.
#[derive(Clone, Copy, Debug, Default)]
pub struct SilentOutput;

impl AudioOutput for SilentOutput {
    fn start(&self, _buffer: &AudioBuffer, _from_frame: usize) {}

    fn halt(&self) {}
}

/// Output that writes each started stream to a WAV file.
#[derive(Clone, Debug)]
pub struct WavFileOutput {
    path: PathBuf,
}

impl WavFileOutput {
    /// Write streams to `path`, replacing it each time.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    #[must_use]
    pub const fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl AudioOutput for WavFileOutput {
    fn start(&self, buffer: &AudioBuffer, from_frame: usize) {
        let samples = buffer.samples().get(from_frame..).unwrap_or_default();
        match File::create(&self.path)
            .map_err(hound::Error::from)
            .and_then(|file| write_wav(BufWriter::new(file), samples, buffer.sample_rate()))
        {
            Ok(()) => debug!("Wrote {} samples to {}", samples.len(), self.path.display()),
            Err(e) => warn!("Failed to write {}: {e}", self.path.display()),
        }
    }

    fn halt(&self) {}
}

/// Format of every written stream: mono 16-bit integer PCM.
#[must_use]
pub const fn wav_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write samples in `[-1, 1]` as a WAV stream.
///
/// # Errors
/// Returns an error if writing fails or the data exceeds the WAV size limit.
pub fn write_wav<W: Write + Seek>(
    out: W,
    samples: &[f32],
    sample_rate: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::new(out, wav_spec(sample_rate))?;
    for sample in samples {
        #[allow(clippy::cast_possible_truncation)]
        let value = (sample.clamp(-1.0, 1.0) * 32767.0).round() as i16;
        writer.write_sample(value)?;
    }
    writer.finalize()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use hound::WavReader;

    use super::*;
    use crate::speech::pcm::SPEECH_SAMPLE_RATE;

    #[test]
    fn test_wav_stream_format_and_samples() {
        let mut bytes = Cursor::new(Vec::new());
        write_wav(&mut bytes, &[0.0, 1.0, -1.0, 2.0], SPEECH_SAMPLE_RATE).unwrap();

        bytes.set_position(0);
        let mut reader = WavReader::new(bytes).unwrap();
        assert_eq!(reader.spec(), wav_spec(24_000));
        let samples: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(samples, vec![0, 32767, -32767, 32767]);
    }

    #[test]
    fn test_wav_file_output_skips_to_offset() {
        let dir = tempfile::tempdir().unwrap();
        let output = WavFileOutput::new(dir.path().join("speech.wav"));
        let buffer = AudioBuffer::new(vec![0.5; 10], SPEECH_SAMPLE_RATE);

        output.start(&buffer, 4);
        let reader = WavReader::open(output.path()).unwrap();
        assert_eq!(reader.len(), 6);
        assert_eq!(reader.spec().sample_rate, SPEECH_SAMPLE_RATE);
    }
}
