//! Single-stream audio playback.
//!
//! At most one stream plays at a time. Starting a stream stops the previous
//! one. Completion is timed with a tokio task; a generation counter makes
//! sure a superseded task never fires its callback.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use super::output::AudioOutput;
use super::pcm::AudioBuffer;

/// Callback run when a stream plays to its end.
pub type OnEnded = Box<dyn FnOnce() + Send + 'static>;

struct ActiveStream {
    buffer: Arc<AudioBuffer>,
    started_at: Instant,
    start_offset: Duration,
    timer: JoinHandle<()>,
}

impl ActiveStream {
    fn position(&self) -> Duration {
        (self.start_offset + self.started_at.elapsed()).min(self.buffer.duration())
    }
}

#[derive(Default)]
struct PlayerState {
    generation: u64,
    active: Option<ActiveStream>,
    on_ended: Option<OnEnded>,
}

/// Plays decoded speech through an [`AudioOutput`].
///
/// Must be used from within a tokio runtime.
pub struct AudioPlayer {
    output: Arc<dyn AudioOutput>,
    state: Arc<Mutex<PlayerState>>,
}

impl AudioPlayer {
    /// Create a player writing to `output`.
    #[must_use]
    pub fn new(output: Arc<dyn AudioOutput>) -> Self {
        Self {
            output,
            state: Arc::new(Mutex::new(PlayerState::default())),
        }
    }

    fn lock(state: &Mutex<PlayerState>) -> MutexGuard<'_, PlayerState> {
        state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Play `buffer` from `start_offset`, stopping whatever was playing.
    ///
    /// `on_ended` runs once if the stream reaches its end. It is dropped
    /// without running after [`stop`](Self::stop) or another `play`.
    pub fn play(
        &self,
        buffer: Arc<AudioBuffer>,
        start_offset: Duration,
        on_ended: impl FnOnce() + Send + 'static,
    ) {
        let mut state = Self::lock(&self.state);
        self.start_locked(&mut state, buffer, start_offset, Box::new(on_ended));
    }

    /// Stop playback. Does nothing when idle.
    pub fn stop(&self) {
        let mut state = Self::lock(&self.state);
        self.halt_locked(&mut state);
        state.on_ended = None;
    }

    /// Move the playhead by `delta_secs` (negative rewinds).
    ///
    /// The target is clamped to the stream bounds and playback restarts
    /// from there with the same completion callback. Returns the new
    /// position, or `None` when idle.
    pub fn seek(&self, delta_secs: f64) -> Option<Duration> {
        let mut state = Self::lock(&self.state);
        let active = state.active.as_ref()?;

        let buffer = Arc::clone(&active.buffer);
        let current = active.position().as_secs_f64();
        let delta = if delta_secs.is_finite() { delta_secs } else { 0.0 };
        let target = Duration::from_secs_f64(
            (current + delta).clamp(0.0, buffer.duration().as_secs_f64()),
        );

        let on_ended = state.on_ended.take().unwrap_or_else(|| Box::new(|| {}));
        self.start_locked(&mut state, buffer, target, on_ended);
        Some(target)
    }

    /// Whether a stream is playing.
    #[must_use]
    pub fn is_playing(&self) -> bool {
        Self::lock(&self.state).active.is_some()
    }

    /// Playhead of the current stream, `None` when idle.
    #[must_use]
    pub fn position(&self) -> Option<Duration> {
        Self::lock(&self.state).active.as_ref().map(ActiveStream::position)
    }

    fn halt_locked(&self, state: &mut PlayerState) {
        if let Some(active) = state.active.take() {
            active.timer.abort();
            debug!("Stopped playback at {:?}", active.position());
        }
        state.generation = state.generation.wrapping_add(1);
        self.output.halt();
    }

    fn start_locked(
        &self,
        state: &mut PlayerState,
        buffer: Arc<AudioBuffer>,
        start_offset: Duration,
        on_ended: OnEnded,
    ) {
        self.halt_locked(state);

        let duration = buffer.duration();
        let offset = start_offset.min(duration);
        let generation = state.generation;

        self.output.start(&buffer, buffer.frame_at(offset));

        let shared = Arc::clone(&self.state);
        let remaining = duration - offset;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            let callback = {
                let mut state = Self::lock(&shared);
                if state.generation != generation {
                    return;
                }
                state.active = None;
                state.on_ended.take()
            };
            if let Some(callback) = callback {
                callback();
            }
        });

        state.active = Some(ActiveStream {
            buffer,
            started_at: Instant::now(),
            start_offset: offset,
            timer,
        });
        state.on_ended = Some(on_ended);
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        let mut state = Self::lock(&self.state);
        self.halt_locked(&mut state);
        state.on_ended = None;
    }
}
