use std::path::Path;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::renderer::pipeline::{PipelineAdapter, PipelineMessage};
use crate::types::media::VideoFrame;
use crate::types::playback_state::{CachedDuration, PlayerState};

/// Play/pause/stop/seek over a [`PipelineAdapter`].
///
/// Requests are fire-and-forget: the pipeline may still be on its way to the
/// requested state when the next refresh tick runs, and that tick shows the
/// state it actually reports.
pub struct TransportController {
    pipeline: Box<dyn PipelineAdapter>,
}

impl TransportController {
    pub fn new(pipeline: Box<dyn PipelineAdapter>) -> Self {
        Self { pipeline }
    }

    /// Pause when playing, play from any other state. Returns the requested state.
    pub fn toggle_play_pause(&mut self, timeout: Duration) -> Result<PlayerState, PipelineError> {
        let target = match self.pipeline.current_state(timeout) {
            PlayerState::Playing => PlayerState::Paused,
            PlayerState::Paused | PlayerState::Ready | PlayerState::Idle => PlayerState::Playing,
        };
        debug!(?target, "toggle play/pause");
        self.pipeline.request_state(target)?;
        Ok(target)
    }

    /// Pin the cached duration at zero, rewind, and hold resources without playing.
    pub fn stop(&mut self, duration: &mut CachedDuration) -> Result<(), PipelineError> {
        *duration = CachedDuration::Known(0.0);
        let seek = self.pipeline.seek_flush(0.0);
        let ready = self.pipeline.request_state(PlayerState::Ready);
        debug!("stopped");
        seek.and(ready)
    }

    pub fn seek(&mut self, position_secs: f64) -> Result<(), PipelineError> {
        debug!(position = position_secs, "seek");
        self.pipeline.seek_flush(position_secs.max(0.0))
    }

    pub fn load(&mut self, artifact: &Path) -> Result<(), PipelineError> {
        self.pipeline.load(artifact)
    }

    pub fn request_state(&mut self, state: PlayerState) -> Result<(), PipelineError> {
        self.pipeline.request_state(state)
    }

    /// Drop to idle and forget the loaded video so its file can be removed.
    pub fn release(&mut self) {
        if let Err(err) = self.pipeline.request_state(PlayerState::Idle) {
            warn!("could not idle pipeline: {err}");
        }
        self.pipeline.unload();
    }

    pub fn state(&self, timeout: Duration) -> PlayerState {
        self.pipeline.current_state(timeout)
    }

    pub fn query_duration(&self) -> Option<f64> {
        self.pipeline.query_duration()
    }

    pub fn query_position(&self) -> Option<f64> {
        self.pipeline.query_position()
    }

    pub fn next_message(&mut self) -> Option<PipelineMessage> {
        self.pipeline.next_message()
    }

    pub fn latest_frame(&mut self) -> Option<VideoFrame> {
        self.pipeline.latest_frame()
    }
}
