//! Orchestration of conversion, playback transport, UI refresh and pipeline events.
//!
//! Everything here runs on the UI loop: `pump` is called once per frame and
//! each handler runs to completion before the next. Only the parse/render
//! work of a conversion runs elsewhere, on a worker that reports back over a
//! channel drained by `pump`.

pub mod dispatcher;
pub mod refresh;
#[cfg(test)]
pub mod testing;
pub mod transport;

use std::fmt::Display;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::ConversionError;
use crate::ops::conversion::{ConversionEvent, ConversionTask};
use crate::ops::export::Exporter;
use crate::ops::midi_parse::MidiParser;
use crate::ops::staging::ArtifactPaths;
use crate::renderer::piano_roll::VideoRenderer;
use crate::renderer::pipeline::PipelineAdapter;
use crate::types::config::AppConfig;
use crate::types::media::VideoFrame;
use crate::types::playback_state::{CachedDuration, PlayerState};
use crate::types::session::Session;
use crate::ui::controls::{CONVERTING_HINT, Control, ControlPanel};
use crate::ui::dialogs::FilePrompt;

use dispatcher::Dispatch;
use refresh::RefreshLoop;
use transport::TransportController;

/// External collaborators the controller drives.
pub struct Collaborators {
    pub parser: Arc<dyn MidiParser>,
    pub renderer: Arc<dyn VideoRenderer>,
    pub exporter: Box<dyn Exporter>,
    pub prompt: Box<dyn FilePrompt>,
}

pub struct Controller {
    pub panel: ControlPanel,
    session: Session,
    transport: TransportController,
    refresh: RefreshLoop,
    paths: ArtifactPaths,
    collaborators: Collaborators,
    conversion: Option<ConversionTask>,
    state_timeout: Duration,
}

impl Controller {
    pub fn new(
        pipeline: Box<dyn PipelineAdapter>,
        collaborators: Collaborators,
        paths: ArtifactPaths,
        config: &AppConfig,
    ) -> Self {
        Self {
            panel: ControlPanel::new(),
            session: Session::new(),
            transport: TransportController::new(pipeline),
            refresh: RefreshLoop::new(config.refresh_interval()),
            paths,
            collaborators,
            conversion: None,
            state_timeout: config.state_query_timeout(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_converting(&self) -> bool {
        self.conversion.is_some()
    }

    pub fn refresh_period(&self) -> Duration {
        self.refresh.period()
    }

    /// One pass of the event loop: conversion results, pipeline messages,
    /// user seeks, then the periodic refresh when due.
    pub fn pump(&mut self, now: Instant) {
        self.poll_conversion();
        self.dispatch_pipeline_messages();
        self.apply_user_seeks();
        if self.refresh.is_due(now) {
            self.refresh_now();
        }
    }

    pub fn latest_frame(&mut self) -> Option<VideoFrame> {
        self.transport.latest_frame()
    }

    fn refresh_now(&mut self) {
        let flow = refresh::tick(
            &self.transport,
            &mut self.session,
            &mut self.panel,
            self.state_timeout,
        );
        self.refresh.settle(flow);
    }

    fn dispatch_pipeline_messages(&mut self) {
        while let Some(message) = self.transport.next_message() {
            let outcome = dispatcher::dispatch(
                message,
                &mut self.transport,
                &mut self.session,
                &mut self.panel,
                &self.paths,
            );
            if outcome == Dispatch::RefreshNow {
                self.refresh_now();
            }
        }
    }

    fn apply_user_seeks(&mut self) {
        // Only the last drag position of this pass matters.
        let Some(position) = self.panel.slider.take_changes().pop() else {
            return;
        };
        if !self.session.has_artifact() {
            return;
        }
        if let Err(err) = self.transport.seek(position) {
            self.report(err);
        }
    }

    fn report(&mut self, err: impl Display) {
        error!("{err}");
        self.panel.report(err.to_string());
    }

    /// Gate every control and move the pipeline between ready and idle.
    fn set_window_sensitive(&mut self, sensitive: bool) {
        let state = if sensitive {
            PlayerState::Ready
        } else {
            PlayerState::Idle
        };
        if let Err(err) = self.transport.request_state(state) {
            warn!("{err}");
        }
        self.panel.set_sensitive(sensitive);
    }

    pub fn toggle_play_pause(&mut self) {
        if !self.panel.is_enabled(Control::PlayPause) {
            return;
        }
        if let Err(err) = self.transport.toggle_play_pause(self.state_timeout) {
            self.report(err);
        }
    }

    pub fn stop(&mut self) {
        if !self.session.has_artifact() {
            return;
        }
        if let Err(err) = self.transport.stop(&mut self.session.duration) {
            warn!("{err}");
        }
        let mut slider = self.panel.slider.block_handler();
        slider.set_value(0.0);
    }

    /// Prompt for a MIDI file and convert it. Cancelling changes nothing.
    pub fn open(&mut self) {
        if self.is_converting() || !self.panel.is_enabled(Control::Open) {
            return;
        }
        match self.collaborators.prompt.pick_source() {
            Some(source) => self.begin_conversion(source),
            None => debug!("open cancelled"),
        }
    }

    pub fn begin_conversion(&mut self, source: PathBuf) {
        info!("opening {}", source.display());
        self.session.duration = CachedDuration::Unknown;
        self.panel.begin_progress(CONVERTING_HINT);
        self.set_window_sensitive(false);

        match ConversionTask::spawn(
            source,
            Arc::clone(&self.collaborators.parser),
            Arc::clone(&self.collaborators.renderer),
            self.paths.clone(),
        ) {
            Ok(task) => self.conversion = Some(task),
            Err(err) => self.finish_conversion(None, Err(err)),
        }
    }

    fn poll_conversion(&mut self) {
        let Some(task) = self.conversion.as_ref() else {
            return;
        };
        let mut finished = None;
        while let Some(event) = task.poll() {
            match event {
                ConversionEvent::Progress(fraction) => self.panel.set_progress(fraction),
                ConversionEvent::Finished(result) => {
                    finished = Some(result);
                    break;
                }
            }
        }
        if let Some(result) = finished {
            let source = self.conversion.take().map(|task| task.source().to_path_buf());
            self.finish_conversion(source, result);
        }
    }

    fn finish_conversion(
        &mut self,
        source: Option<PathBuf>,
        result: Result<PathBuf, ConversionError>,
    ) {
        match result {
            Ok(staged) => match self.transport.load(&staged) {
                Ok(()) => {
                    info!("loaded {}", staged.display());
                    self.session.source = source;
                    self.session.artifact = Some(staged);
                    self.panel.set_has_artifact(true);
                    self.panel.finish_progress();
                }
                Err(err) => {
                    self.transport.release();
                    self.session.artifact = None;
                    self.paths.remove_all();
                    self.panel.reset_to_idle();
                    self.report(err);
                }
            },
            Err(ConversionError::Cancelled) => {
                info!("conversion cancelled");
                self.panel.abort_progress();
            }
            Err(err) => {
                self.panel.abort_progress();
                self.report(err);
            }
        }
        self.set_window_sensitive(true);
    }

    /// Export the staged video, prompting for a destination when none is set
    /// or when `save_as` is requested. Cancelling the prompt changes nothing.
    pub fn save(&mut self, save_as: bool) {
        if self.is_converting() {
            return;
        }
        let Some(artifact) = self.session.artifact.clone() else {
            debug!("nothing to save");
            return;
        };
        if self.session.destination().is_none() || save_as {
            match self.collaborators.prompt.pick_destination() {
                Some(destination) => self.session.set_destination(destination),
                None => {
                    debug!("save cancelled");
                    return;
                }
            }
        }
        let Some(destination) = self.session.destination().map(|p| p.to_path_buf()) else {
            return;
        };

        self.set_window_sensitive(false);
        let result = self.collaborators.exporter.export(&artifact, &destination);
        self.set_window_sensitive(true);
        match result {
            Ok(()) => info!("saved {}", destination.display()),
            Err(err) => self.report(err),
        }
    }

    /// Window close: cancel and join any conversion, stop playback, release
    /// and delete the video.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.conversion.take() {
            task.cancel_and_join();
        }
        self.stop();
        self.refresh.cancel();
        self.transport.release();
        self.session.artifact = None;
        self.paths.remove_all();
        info!("shut down");
    }
}
