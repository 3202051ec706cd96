use tracing::{debug, error, trace, warn};

use crate::controller::transport::TransportController;
use crate::ops::staging::ArtifactPaths;
use crate::renderer::pipeline::PipelineMessage;
use crate::types::playback_state::PlayerState;
use crate::types::session::Session;
use crate::ui::controls::ControlPanel;

/// What the controller should do after a message was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Handled,
    /// Run a refresh tick now instead of waiting for the next period.
    RefreshNow,
    Ignored,
}

/// React to one pipeline notification.
///
/// Errors leave the window open in a reopenable idle state: the video is
/// released and deleted, transport and save controls are disabled, and Open
/// stays available.
pub fn dispatch(
    message: PipelineMessage,
    transport: &mut TransportController,
    session: &mut Session,
    panel: &mut ControlPanel,
    paths: &ArtifactPaths,
) -> Dispatch {
    match message {
        PipelineMessage::Error {
            source,
            message,
            debug,
        } => {
            let debug_info = debug.as_deref().unwrap_or("");
            error!(%source, debug = debug_info, "pipeline error: {message}");
            panel.report(format!("Playback failed ({source}): {message}"));
            transport.release();
            session.artifact = None;
            paths.remove_staged();
            panel.reset_to_idle();
            Dispatch::Handled
        }
        PipelineMessage::StateChanged {
            from_player,
            old,
            current,
        } => {
            if !from_player {
                return Dispatch::Ignored;
            }
            debug!(?old, ?current, "player state changed");
            Dispatch::RefreshNow
        }
        PipelineMessage::EndOfStream => {
            debug!("end of stream");
            if let Err(err) = transport.request_state(PlayerState::Ready) {
                warn!("could not stop at end of stream: {err}");
            }
            Dispatch::Handled
        }
        PipelineMessage::Other(kind) => {
            trace!(%kind, "ignored pipeline message");
            Dispatch::Ignored
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::MockPipeline;
    use crate::ui::controls::{Control, IDLE_HINT};
    use std::fs;

    struct Fixture {
        transport: TransportController,
        mock: MockPipeline,
        session: Session,
        panel: ControlPanel,
        paths: ArtifactPaths,
        _dir: tempfile::TempDir,
    }

    impl Fixture {
        fn loaded(state: PlayerState) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let paths = ArtifactPaths::in_dir(dir.path());
            fs::write(&paths.staged, b"10").unwrap();
            let mock = MockPipeline::new();
            mock.with(|m| {
                m.loaded = Some(paths.staged.clone());
                m.state = state;
            });
            let mut session = Session::new();
            session.artifact = Some(paths.staged.clone());
            let mut panel = ControlPanel::new();
            panel.set_has_artifact(true);
            panel.finish_progress();
            Self {
                transport: TransportController::new(Box::new(mock.clone())),
                mock,
                session,
                panel,
                paths,
                _dir: dir,
            }
        }

        fn dispatch(&mut self, message: PipelineMessage) -> Dispatch {
            dispatch(
                message,
                &mut self.transport,
                &mut self.session,
                &mut self.panel,
                &self.paths,
            )
        }
    }

    #[test]
    fn test_error_tears_down_to_idle() {
        let mut fx = Fixture::loaded(PlayerState::Playing);
        let outcome = fx.dispatch(PipelineMessage::Error {
            source: "decoder".to_string(),
            message: "stream broken".to_string(),
            debug: None,
        });
        assert_eq!(outcome, Dispatch::Handled);
        assert_eq!(fx.mock.with(|m| m.state), PlayerState::Idle);
        assert!(fx.mock.with(|m| m.loaded.is_none()));
        assert!(!fx.paths.staged.exists());
        assert!(fx.session.artifact.is_none());
        assert!(fx.panel.is_enabled(Control::Open));
        assert!(!fx.panel.is_enabled(Control::PlayPause));
        assert!(!fx.panel.player_visible);
        assert_eq!(fx.panel.hint.as_deref(), Some(IDLE_HINT));
        assert!(fx.panel.last_error.as_deref().unwrap().contains("stream broken"));
    }

    #[test]
    fn test_error_leaves_working_file_to_conversion() {
        let mut fx = Fixture::loaded(PlayerState::Paused);
        fs::write(&fx.paths.work, b"rendering").unwrap();
        fx.dispatch(PipelineMessage::Error {
            source: "decoder".to_string(),
            message: "stream broken".to_string(),
            debug: None,
        });
        assert!(!fx.paths.staged.exists());
        assert!(fx.paths.work.exists());
    }

    #[test]
    fn test_state_change_from_player_forces_refresh() {
        let mut fx = Fixture::loaded(PlayerState::Paused);
        let message = |from_player| PipelineMessage::StateChanged {
            from_player,
            old: PlayerState::Paused,
            current: PlayerState::Playing,
        };
        assert_eq!(fx.dispatch(message(true)), Dispatch::RefreshNow);
        assert_eq!(fx.dispatch(message(false)), Dispatch::Ignored);
    }

    #[test]
    fn test_end_of_stream_always_ready() {
        for state in [
            PlayerState::Playing,
            PlayerState::Paused,
            PlayerState::Ready,
            PlayerState::Idle,
        ] {
            let mut fx = Fixture::loaded(state);
            fx.mock.with(|m| m.position = 10.0);
            assert_eq!(fx.dispatch(PipelineMessage::EndOfStream), Dispatch::Handled);
            assert_eq!(fx.mock.with(|m| m.state), PlayerState::Ready);
            assert!(fx.mock.with(|m| m.seeks.is_empty()));
            assert!(fx.paths.staged.exists());
        }
    }

    #[test]
    fn test_other_messages_ignored() {
        let mut fx = Fixture::loaded(PlayerState::Playing);
        assert_eq!(
            fx.dispatch(PipelineMessage::Other("Tag".to_string())),
            Dispatch::Ignored
        );
        assert_eq!(fx.mock.with(|m| m.state), PlayerState::Playing);
        assert!(fx.session.artifact.is_some());
    }
}
