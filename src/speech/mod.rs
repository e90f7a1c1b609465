//! Text-to-speech.
//!
//! - `gemini_tts`: remote synthesis with a per-text cache
//! - `pcm`: raw PCM decoding
//! - `player`: single-stream playback with seek
//! - `output`: audio sinks

pub mod gemini_tts;
pub mod output;
pub mod pcm;
pub mod player;

pub use gemini_tts::{GeminiTts, SynthesisError};
pub use output::{AudioOutput, SilentOutput, WavFileOutput};
pub use pcm::AudioBuffer;
pub use player::AudioPlayer;
