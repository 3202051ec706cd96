//! Scripted collaborators for exercising the controller without a display or GStreamer.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};

use crate::error::{ExportError, PipelineError, RenderError};
use crate::ops::conversion::{CancelToken, ProgressSink};
use crate::ops::export::Exporter;
use crate::renderer::piano_roll::VideoRenderer;
use crate::renderer::pipeline::{PipelineAdapter, PipelineMessage};
use crate::types::media::MidiScore;
use crate::types::playback_state::PlayerState;
use crate::ui::dialogs::FilePrompt;

#[derive(Debug, Clone, Copy)]
pub struct FixtureNote {
    pub key: u8,
    pub start_tick: u32,
    pub length_ticks: u32,
}

impl FixtureNote {
    pub fn new(key: u8, start_tick: u32, length_ticks: u32) -> Self {
        Self {
            key,
            start_tick,
            length_ticks,
        }
    }
}

/// Write a single-track SMF at 480 ticks per quarter.
pub fn write_midi_fixture(path: &Path, tempo_us: Option<u32>, notes: &[FixtureNote]) {
    let mut timed: Vec<(u32, TrackEventKind<'static>)> = Vec::new();
    if let Some(tempo) = tempo_us {
        timed.push((0, TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo)))));
    }
    for note in notes {
        timed.push((note.start_tick, note_on(note.key, 100)));
        timed.push((
            note.start_tick + note.length_ticks,
            TrackEventKind::Midi {
                channel: u4::new(0),
                message: MidiMessage::NoteOff {
                    key: u7::new(note.key),
                    vel: u7::new(0),
                },
            },
        ));
    }
    timed.sort_by_key(|(tick, _)| *tick);
    write_smf(path, Timing::Metrical(u15::new(480)), &timed, None);
}

pub fn note_on(key: u8, velocity: u8) -> TrackEventKind<'static> {
    TrackEventKind::Midi {
        channel: u4::new(0),
        message: MidiMessage::NoteOn {
            key: u7::new(key),
            vel: u7::new(velocity),
        },
    }
}

/// Write one track of `(absolute tick, event)` pairs, already in tick order.
/// The end-of-track marker goes at `end_tick`, or right after the last event.
pub fn write_smf(
    path: &Path,
    timing: Timing,
    events: &[(u32, TrackEventKind<'static>)],
    end_tick: Option<u32>,
) {
    let mut track = Vec::new();
    let mut last = 0;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: u28::new(tick - last),
            kind: *kind,
        });
        last = *tick;
    }
    let end = end_tick.unwrap_or(last).max(last);
    track.push(TrackEvent {
        delta: u28::new(end - last),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(Format::SingleTrack, timing));
    smf.tracks.push(track);
    smf.save(path).unwrap();
}

#[derive(Debug, Default)]
pub struct MockPipelineState {
    pub state: PlayerState,
    /// When set, requested states only take effect after the next state query.
    pub lag_state_changes: bool,
    pub pending: Option<PlayerState>,
    pub loaded: Option<PathBuf>,
    pub media_duration: Option<f64>,
    pub position: f64,
    pub duration_queries: usize,
    pub seeks: Vec<f64>,
    pub state_requests: Vec<PlayerState>,
    pub messages: VecDeque<PipelineMessage>,
    pub fail_load: bool,
    pub fail_seeks: bool,
}

/// In-memory pipeline. Loading reads the staged file as a duration in seconds,
/// which is what [`StubRenderer`] writes.
#[derive(Debug, Clone, Default)]
pub struct MockPipeline(Rc<RefCell<MockPipelineState>>);

impl MockPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockPipelineState) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }

    pub fn post(&self, message: PipelineMessage) {
        self.with(|m| m.messages.push_back(message));
    }
}

impl PipelineAdapter for MockPipeline {
    fn load(&mut self, artifact: &Path) -> Result<(), PipelineError> {
        self.with(|m| {
            if m.fail_load {
                return Err(PipelineError::Load {
                    path: artifact.to_path_buf(),
                    reason: "scripted failure".to_string(),
                });
            }
            let text = fs::read_to_string(artifact).map_err(|e| PipelineError::Load {
                path: artifact.to_path_buf(),
                reason: e.to_string(),
            })?;
            m.media_duration = text.trim().parse().ok();
            m.loaded = Some(artifact.to_path_buf());
            m.position = 0.0;
            Ok(())
        })
    }

    fn unload(&mut self) {
        self.with(|m| {
            m.loaded = None;
            m.media_duration = None;
        });
    }

    fn current_state(&self, _timeout: Duration) -> PlayerState {
        self.with(|m| {
            let current = m.state;
            if let Some(pending) = m.pending.take() {
                m.state = pending;
            }
            current
        })
    }

    fn request_state(&mut self, state: PlayerState) -> Result<(), PipelineError> {
        self.with(|m| {
            m.state_requests.push(state);
            if m.lag_state_changes {
                m.pending = Some(state);
            } else {
                m.state = state;
            }
        });
        Ok(())
    }

    fn seek_flush(&mut self, position_secs: f64) -> Result<(), PipelineError> {
        self.with(|m| {
            if m.fail_seeks {
                return Err(PipelineError::Seek {
                    position: position_secs,
                });
            }
            m.seeks.push(position_secs);
            m.position = position_secs;
            Ok(())
        })
    }

    fn query_duration(&self) -> Option<f64> {
        self.with(|m| {
            m.duration_queries += 1;
            if m.loaded.is_some() && m.state >= PlayerState::Paused {
                m.media_duration
            } else {
                None
            }
        })
    }

    fn query_position(&self) -> Option<f64> {
        self.with(|m| (m.loaded.is_some() && m.state >= PlayerState::Paused).then_some(m.position))
    }

    fn next_message(&mut self) -> Option<PipelineMessage> {
        self.with(|m| m.messages.pop_front())
    }
}

/// Writes the score duration as text instead of encoding a video.
#[derive(Debug, Default)]
pub struct StubRenderer {
    fail: bool,
    /// Notified once the first progress step is out, after which the
    /// render holds until it is cancelled.
    hold: Option<Sender<()>>,
}

impl StubRenderer {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn until_cancelled(started: Sender<()>) -> Self {
        Self {
            hold: Some(started),
            ..Self::default()
        }
    }
}

impl VideoRenderer for StubRenderer {
    fn render(
        &self,
        score: &MidiScore,
        output: &Path,
        progress: &mut dyn ProgressSink,
        cancel: &CancelToken,
    ) -> Result<(), RenderError> {
        fs::write(output, b"partial")?;
        if self.fail {
            return Err(RenderError::Pipeline("scripted failure".to_string()));
        }
        for fraction in [0.25, 0.5, 1.0] {
            if cancel.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            progress.report(fraction);
            if fraction == 0.25
                && let Some(started) = &self.hold
            {
                let _ = started.send(());
                for _ in 0..500 {
                    if cancel.is_cancelled() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }
        fs::write(output, score.duration_secs.to_string())?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PromptScript {
    pub sources: VecDeque<Option<PathBuf>>,
    pub destinations: VecDeque<Option<PathBuf>>,
    pub source_prompts: usize,
    pub destination_prompts: usize,
}

/// Answers prompts from queues; an empty queue answers "cancel".
#[derive(Debug, Clone, Default)]
pub struct ScriptedPrompt(Rc<RefCell<PromptScript>>);

impl ScriptedPrompt {
    pub fn with<R>(&self, f: impl FnOnce(&mut PromptScript) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

impl FilePrompt for ScriptedPrompt {
    fn pick_source(&mut self) -> Option<PathBuf> {
        self.with(|p| {
            p.source_prompts += 1;
            p.sources.pop_front().flatten()
        })
    }

    fn pick_destination(&mut self) -> Option<PathBuf> {
        self.with(|p| {
            p.destination_prompts += 1;
            p.destinations.pop_front().flatten()
        })
    }
}

/// Records exports instead of writing files.
#[derive(Debug, Clone, Default)]
pub struct RecordingExporter {
    pub exports: Rc<RefCell<Vec<(PathBuf, PathBuf)>>>,
    pub fail: bool,
}

impl Exporter for RecordingExporter {
    fn export(&self, artifact: &Path, destination: &Path) -> Result<(), ExportError> {
        if self.fail {
            return Err(ExportError::MissingArtifact(artifact.to_path_buf()));
        }
        self.exports
            .borrow_mut()
            .push((artifact.to_path_buf(), destination.to_path_buf()));
        Ok(())
    }
}
