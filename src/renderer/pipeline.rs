use std::path::Path;
use std::time::Duration;

use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use tracing::debug;

use crate::error::PipelineError;
use crate::types::media::VideoFrame;
use crate::types::playback_state::PlayerState;

/// Name given to the top-level playback element.
pub const PLAYER_NAME: &str = "player";

/// Notifications posted by the pipeline, drained on the UI loop.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineMessage {
    Error {
        source: String,
        message: String,
        debug: Option<String>,
    },
    StateChanged {
        /// Posted by the top-level player rather than one of its children.
        from_player: bool,
        old: PlayerState,
        current: PlayerState,
    },
    EndOfStream,
    /// Any other message type, by name.
    Other(String),
}

/// Playback side of the media pipeline.
///
/// An adapter only exists once its backend is initialised, so every request
/// below may assume a live pipeline.
pub trait PipelineAdapter {
    fn load(&mut self, artifact: &Path) -> Result<(), PipelineError>;
    fn unload(&mut self);
    /// Current state, waiting at most `timeout` for a pending change to settle.
    fn current_state(&self, timeout: Duration) -> PlayerState;
    fn request_state(&mut self, state: PlayerState) -> Result<(), PipelineError>;
    /// Flushing seek; no stale buffered position is reported afterwards.
    fn seek_flush(&mut self, position_secs: f64) -> Result<(), PipelineError>;
    fn query_duration(&self) -> Option<f64>;
    fn query_position(&self) -> Option<f64>;
    fn next_message(&mut self) -> Option<PipelineMessage>;
    /// Most recent decoded frame, if a new one arrived.
    fn latest_frame(&mut self) -> Option<VideoFrame> {
        None
    }
}

impl From<gst::State> for PlayerState {
    fn from(state: gst::State) -> Self {
        match state {
            gst::State::Playing => PlayerState::Playing,
            gst::State::Paused => PlayerState::Paused,
            gst::State::Ready => PlayerState::Ready,
            _ => PlayerState::Idle,
        }
    }
}

impl From<PlayerState> for gst::State {
    fn from(state: PlayerState) -> Self {
        match state {
            PlayerState::Playing => gst::State::Playing,
            PlayerState::Paused => gst::State::Paused,
            PlayerState::Ready => gst::State::Ready,
            PlayerState::Idle => gst::State::Null,
        }
    }
}

fn to_clock_time(secs: f64) -> gst::ClockTime {
    gst::ClockTime::from_nseconds((secs.max(0.0) * 1_000_000_000.0) as u64)
}

fn to_secs(time: gst::ClockTime) -> f64 {
    time.nseconds() as f64 / 1_000_000_000.0
}

/// `playbin` with its video routed into an RGBA `appsink` for the egui surface.
pub struct GstPipeline {
    playbin: gst::Element,
    appsink: gst_app::AppSink,
    bus: gst::Bus,
}

impl GstPipeline {
    pub fn new() -> Result<Self, PipelineError> {
        gst::init().map_err(|e| PipelineError::Init(e.to_string()))?;

        let appsink = gst_app::AppSink::builder()
            .caps(
                &gst_video::VideoCapsBuilder::new()
                    .format(gst_video::VideoFormat::Rgba)
                    .build(),
            )
            .max_buffers(1)
            .drop(true)
            .build();
        let playbin = gst::ElementFactory::make("playbin")
            .name(PLAYER_NAME)
            .build()
            .map_err(|e| PipelineError::Init(e.to_string()))?;
        playbin.set_property("video-sink", &appsink);
        let bus = playbin
            .bus()
            .ok_or_else(|| PipelineError::Init("player has no bus".to_string()))?;

        Ok(Self {
            playbin,
            appsink,
            bus,
        })
    }

    fn translate(&self, msg: &gst::Message) -> PipelineMessage {
        match msg.view() {
            gst::MessageView::Error(err) => PipelineMessage::Error {
                source: msg
                    .src()
                    .map(|s| s.name().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: err.error().to_string(),
                debug: err.debug().map(|d| d.to_string()),
            },
            gst::MessageView::StateChanged(change) => PipelineMessage::StateChanged {
                from_player: msg.src() == Some(self.playbin.upcast_ref::<gst::Object>()),
                old: change.old().into(),
                current: change.current().into(),
            },
            gst::MessageView::Eos(..) => PipelineMessage::EndOfStream,
            _ => PipelineMessage::Other(format!("{:?}", msg.type_())),
        }
    }
}

impl PipelineAdapter for GstPipeline {
    fn load(&mut self, artifact: &Path) -> Result<(), PipelineError> {
        let load_err = |reason: String| PipelineError::Load {
            path: artifact.to_path_buf(),
            reason,
        };
        let absolute = std::path::absolute(artifact).map_err(|e| load_err(e.to_string()))?;
        let uri = gst::glib::filename_to_uri(&absolute, None).map_err(|e| load_err(e.to_string()))?;
        self.playbin.set_property("uri", uri.as_str());
        debug!(%uri, "player source set");
        Ok(())
    }

    fn unload(&mut self) {
        let _ = self.playbin.set_state(gst::State::Null);
        self.playbin.set_property("uri", None::<&str>);
    }

    fn current_state(&self, timeout: Duration) -> PlayerState {
        let timeout = gst::ClockTime::from_nseconds(timeout.as_nanos() as u64);
        let (_result, current, _pending) = self.playbin.state(Some(timeout));
        current.into()
    }

    fn request_state(&mut self, state: PlayerState) -> Result<(), PipelineError> {
        self.playbin
            .set_state(state.into())
            .map(|_| ())
            .map_err(|_| PipelineError::StateChange { requested: state })
    }

    fn seek_flush(&mut self, position_secs: f64) -> Result<(), PipelineError> {
        self.playbin
            .seek_simple(gst::SeekFlags::FLUSH, to_clock_time(position_secs))
            .map_err(|_| PipelineError::Seek {
                position: position_secs,
            })
    }

    fn query_duration(&self) -> Option<f64> {
        self.playbin.query_duration::<gst::ClockTime>().map(to_secs)
    }

    fn query_position(&self) -> Option<f64> {
        self.playbin.query_position::<gst::ClockTime>().map(to_secs)
    }

    fn next_message(&mut self) -> Option<PipelineMessage> {
        let msg = self.bus.pop()?;
        Some(self.translate(&msg))
    }

    fn latest_frame(&mut self) -> Option<VideoFrame> {
        let sample = self
            .appsink
            .try_pull_sample(gst::ClockTime::ZERO)
            .or_else(|| self.appsink.try_pull_preroll(gst::ClockTime::ZERO))?;
        let info = gst_video::VideoInfo::from_caps(sample.caps()?).ok()?;
        let buffer = sample.buffer()?;
        let map = buffer.map_readable().ok()?;

        // Repack rows in case the stride carries padding.
        let row_bytes = info.width() as usize * 4;
        let stride = info.stride()[0] as usize;
        let mut data = Vec::with_capacity(row_bytes * info.height() as usize);
        for row in map.as_slice().chunks(stride).take(info.height() as usize) {
            data.extend_from_slice(row.get(..row_bytes)?);
        }
        Some(VideoFrame {
            data,
            width: info.width(),
            height: info.height(),
        })
    }
}

impl Drop for GstPipeline {
    fn drop(&mut self) {
        let _ = self.playbin.set_state(gst::State::Null);
    }
}
