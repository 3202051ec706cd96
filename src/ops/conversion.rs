use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{debug, info, warn};

use crate::error::ConversionError;
use crate::ops::midi_parse::MidiParser;
use crate::ops::staging::ArtifactPaths;
use crate::renderer::piano_roll::VideoRenderer;

/// Shared flag checked by the worker at safe points.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub fn check(&self) -> Result<(), ConversionError> {
        if self.is_cancelled() {
            Err(ConversionError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receives fractional render progress in `[0.0, 1.0]`.
pub trait ProgressSink {
    fn report(&mut self, fraction: f64);
}

impl<F: FnMut(f64)> ProgressSink for F {
    fn report(&mut self, fraction: f64) {
        self(fraction)
    }
}

#[derive(Debug)]
pub enum ConversionEvent {
    Progress(f64),
    Finished(Result<PathBuf, ConversionError>),
}

struct ChannelProgress(Sender<ConversionEvent>);

impl ProgressSink for ChannelProgress {
    fn report(&mut self, fraction: f64) {
        // The receiver going away means the window closed; the cancel token stops us.
        let _ = self.0.send(ConversionEvent::Progress(fraction.clamp(0.0, 1.0)));
    }
}

/// Parse, render and stage `source`. Returns the staged path.
///
/// On any failure neither the working nor a newly staged file is left behind.
pub fn run_conversion(
    source: &Path,
    parser: &dyn MidiParser,
    renderer: &dyn VideoRenderer,
    paths: &ArtifactPaths,
    progress: &mut dyn ProgressSink,
    cancel: &CancelToken,
) -> Result<PathBuf, ConversionError> {
    info!("converting {}", source.display());
    let score = parser.parse(source)?;
    cancel.check()?;

    progress.report(0.0);
    if let Err(err) = renderer.render(&score, &paths.work, progress, cancel) {
        paths.discard_work();
        return Err(err.into());
    }
    if let Err(err) = cancel.check() {
        paths.discard_work();
        return Err(err);
    }

    let staged = paths.stage().inspect_err(|_| paths.discard_work())?;
    info!(
        duration = score.duration_secs,
        "staged {}",
        staged.display()
    );
    Ok(staged.to_path_buf())
}

/// A conversion running on a worker thread, reporting through a channel.
pub struct ConversionTask {
    source: PathBuf,
    events: Receiver<ConversionEvent>,
    cancel: CancelToken,
    worker: Option<JoinHandle<()>>,
}

impl ConversionTask {
    pub fn spawn(
        source: PathBuf,
        parser: Arc<dyn MidiParser>,
        renderer: Arc<dyn VideoRenderer>,
        paths: ArtifactPaths,
    ) -> Result<Self, ConversionError> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let cancel = CancelToken::new();
        let worker_cancel = cancel.clone();
        let worker_source = source.clone();

        let worker = thread::Builder::new()
            .name("conversion".to_string())
            .spawn(move || {
                let mut progress = ChannelProgress(tx.clone());
                let result = run_conversion(
                    &worker_source,
                    parser.as_ref(),
                    renderer.as_ref(),
                    &paths,
                    &mut progress,
                    &worker_cancel,
                );
                if tx.send(ConversionEvent::Finished(result)).is_err() {
                    debug!("conversion finished after its receiver closed");
                }
            })
            .map_err(ConversionError::Spawn)?;

        Ok(Self {
            source,
            events: rx,
            cancel,
            worker: Some(worker),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Next pending event without blocking. A worker that died without
    /// reporting shows up as a failed `Finished`.
    pub fn poll(&self) -> Option<ConversionEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                warn!("conversion worker disconnected");
                Some(ConversionEvent::Finished(Err(ConversionError::WorkerLost)))
            }
        }
    }

    /// Stop the worker at its next check and wait until it has cleaned up.
    pub fn cancel_and_join(mut self) {
        self.cancel.cancel();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("conversion worker panicked");
        }
        debug!("conversion worker joined");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::{FixtureNote, StubRenderer, write_midi_fixture};
    use crate::error::{ParseError, RenderError};
    use crate::ops::midi_parse::SmfParser;
    use std::time::Duration;

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("song.mid");
        write_midi_fixture(&path, None, &[FixtureNote::new(60, 0, 960)]);
        path
    }

    #[test]
    fn test_run_conversion_stages_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let renderer = StubRenderer::default();
        let mut seen = Vec::new();
        let staged = run_conversion(
            &source,
            &SmfParser,
            &renderer,
            &paths,
            &mut |f: f64| seen.push(f),
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(staged, paths.staged);
        assert!(paths.staged.exists());
        assert!(!paths.work.exists());
        assert_eq!(seen.first(), Some(&0.0));
        assert_eq!(seen.last(), Some(&1.0));
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_parse_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.mid");
        std::fs::write(&source, b"garbage").unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let err = run_conversion(
            &source,
            &SmfParser,
            &StubRenderer::default(),
            &paths,
            &mut |_: f64| {},
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::Parse(ParseError::Malformed { .. })));
        assert!(!paths.work.exists());
        assert!(!paths.staged.exists());
    }

    #[test]
    fn test_render_failure_discards_work() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let err = run_conversion(
            &source,
            &SmfParser,
            &StubRenderer::failing(),
            &paths,
            &mut |_: f64| {},
            &CancelToken::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::Render(RenderError::Pipeline(_))));
        assert!(!paths.work.exists());
        assert!(!paths.staged.exists());
    }

    #[test]
    fn test_cancelled_before_render() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let cancel = CancelToken::new();
        cancel.cancel();
        let err = run_conversion(
            &source,
            &SmfParser,
            &StubRenderer::default(),
            &paths,
            &mut |_: f64| {},
            &cancel,
        )
        .unwrap_err();
        assert!(matches!(err, ConversionError::Cancelled));
        assert!(!paths.staged.exists());
    }

    #[test]
    fn test_cancel_mid_render_discards_work() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let renderer = StubRenderer::until_cancelled(started_tx);
        let cancel = CancelToken::new();
        let mut seen = Vec::new();

        let result = thread::scope(|scope| {
            let canceller = cancel.clone();
            let watched = paths.clone();
            scope.spawn(move || {
                started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
                assert!(watched.work.exists());
                canceller.cancel();
            });
            run_conversion(
                &source,
                &SmfParser,
                &renderer,
                &paths,
                &mut |f: f64| seen.push(f),
                &cancel,
            )
        });

        assert!(matches!(result, Err(ConversionError::Cancelled)));
        assert!(!paths.work.exists());
        assert!(!paths.staged.exists());
        assert_eq!(seen.last(), Some(&0.25));
    }

    #[test]
    fn test_cancel_and_join_waits_for_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let (started_tx, started_rx) = crossbeam_channel::unbounded();
        let task = ConversionTask::spawn(
            source,
            Arc::new(SmfParser),
            Arc::new(StubRenderer::until_cancelled(started_tx)),
            paths.clone(),
        )
        .unwrap();
        started_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        task.cancel_and_join();
        assert!(!paths.work.exists());
        assert!(!paths.staged.exists());
    }

    #[test]
    fn test_task_reports_progress_then_result() {
        let dir = tempfile::tempdir().unwrap();
        let source = fixture(dir.path());
        let paths = ArtifactPaths::in_dir(dir.path());
        let task = ConversionTask::spawn(
            source.clone(),
            Arc::new(SmfParser),
            Arc::new(StubRenderer::default()),
            paths.clone(),
        )
        .unwrap();
        assert_eq!(task.source(), source.as_path());

        let mut progress = Vec::new();
        let result = loop {
            match task.events.recv_timeout(Duration::from_secs(5)).unwrap() {
                ConversionEvent::Progress(f) => progress.push(f),
                ConversionEvent::Finished(result) => break result,
            }
        };
        assert_eq!(result.unwrap(), paths.staged);
        assert_eq!(progress.last(), Some(&1.0));
    }
}
