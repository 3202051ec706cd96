use std::ops::ControlFlow;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::controller::transport::TransportController;
use crate::types::playback_state::{CachedDuration, PlayPresentation};
use crate::types::session::Session;
use crate::ui::controls::ControlPanel;

/// Fixed-period schedule for [`tick`]. Runs until cancelled by window close.
#[derive(Debug)]
pub struct RefreshLoop {
    period: Duration,
    next_due: Option<Instant>,
    cancelled: bool,
}

impl RefreshLoop {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
            cancelled: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// True when a tick should run at `now`; schedules the following one.
    pub fn is_due(&mut self, now: Instant) -> bool {
        if self.cancelled {
            return false;
        }
        match self.next_due {
            Some(due) if now < due => false,
            _ => {
                self.next_due = Some(now + self.period);
                true
            }
        }
    }

    /// Apply a tick's verdict; `Break` removes the loop for good.
    pub fn settle(&mut self, flow: ControlFlow<()>) {
        if flow.is_break() {
            self.cancel();
        }
    }

    pub fn cancel(&mut self) {
        if !self.cancelled {
            debug!("refresh loop cancelled");
        }
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Bring the play button and slider in line with the pipeline.
pub fn tick(
    transport: &TransportController,
    session: &mut Session,
    panel: &mut ControlPanel,
    timeout: Duration,
) -> ControlFlow<()> {
    if !transport.state(timeout).is_playing() {
        panel.play_presentation = PlayPresentation::Resume;
        return ControlFlow::Continue(());
    }
    panel.play_presentation = PlayPresentation::Pause;

    if session.duration.is_unknown()
        && let Some(duration) = transport.query_duration()
    {
        session.duration = CachedDuration::Known(duration);
        panel.slider.set_range(duration);
        panel.slider.set_fill_level(duration);
        debug!(duration, "duration known");
    }

    if let Some(position) = transport.query_position() {
        let mut slider = panel.slider.block_handler();
        slider.set_value(position);
    }
    ControlFlow::Continue(())
}
