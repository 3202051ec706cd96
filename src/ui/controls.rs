use std::ops::{Deref, DerefMut};

use crate::types::playback_state::PlayPresentation;

pub const IDLE_HINT: &str = "Open a MIDI file to begin";
pub const CONVERTING_HINT: &str = "Parsing MIDI file into video...";

/// Seek slider model with GTK-style value-changed notifications.
///
/// Every write emits a change unless the handler is blocked. Programmatic
/// writes go through [`SeekSlider::block_handler`] so they never come back as
/// user seeks.
#[derive(Debug, Default)]
pub struct SeekSlider {
    value: f64,
    upper: f64,
    fill_level: f64,
    block_depth: u32,
    changes: Vec<f64>,
}

impl SeekSlider {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn upper(&self) -> f64 {
        self.upper
    }

    pub fn fill_level(&self) -> f64 {
        self.fill_level
    }

    pub fn is_blocked(&self) -> bool {
        self.block_depth > 0
    }

    pub fn set_range(&mut self, upper: f64) {
        self.upper = upper.max(0.0);
        self.value = self.value.min(self.upper);
    }

    pub fn set_fill_level(&mut self, level: f64) {
        self.fill_level = level.max(0.0);
    }

    pub fn set_value(&mut self, value: f64) {
        let value = value.clamp(0.0, self.upper);
        if value == self.value {
            return;
        }
        self.value = value;
        if !self.is_blocked() {
            self.changes.push(value);
        }
    }

    /// Block change notifications until the returned guard drops.
    pub fn block_handler(&mut self) -> SliderGuard<'_> {
        self.block_depth += 1;
        SliderGuard { slider: self }
    }

    /// Values written while unblocked since the last call.
    pub fn take_changes(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.changes)
    }
}

/// Unblocks the slider on drop, including during unwinding.
pub struct SliderGuard<'a> {
    slider: &'a mut SeekSlider,
}

impl Deref for SliderGuard<'_> {
    type Target = SeekSlider;

    fn deref(&self) -> &SeekSlider {
        self.slider
    }
}

impl DerefMut for SliderGuard<'_> {
    fn deref_mut(&mut self) -> &mut SeekSlider {
        self.slider
    }
}

impl Drop for SliderGuard<'_> {
    fn drop(&mut self) {
        self.slider.block_depth = self.slider.block_depth.saturating_sub(1);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    PlayPause,
    Stop,
    Slider,
    Open,
    Save,
    SaveAs,
    Quit,
}

/// Everything the window displays about transport and workflow state.
#[derive(Debug)]
pub struct ControlPanel {
    pub play_presentation: PlayPresentation,
    pub slider: SeekSlider,
    sensitive: bool,
    has_artifact: bool,
    pub progress: f64,
    pub hint: Option<String>,
    pub player_visible: bool,
    pub last_error: Option<String>,
}

impl Default for ControlPanel {
    fn default() -> Self {
        Self {
            play_presentation: PlayPresentation::Resume,
            slider: SeekSlider::default(),
            sensitive: true,
            has_artifact: false,
            progress: 0.0,
            hint: Some(IDLE_HINT.to_string()),
            player_visible: false,
            last_error: None,
        }
    }
}

impl ControlPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, control: Control) -> bool {
        match control {
            Control::Open | Control::Quit => self.sensitive,
            Control::PlayPause
            | Control::Stop
            | Control::Slider
            | Control::Save
            | Control::SaveAs => self.sensitive && self.has_artifact,
        }
    }

    pub fn set_sensitive(&mut self, sensitive: bool) {
        self.sensitive = sensitive;
    }

    pub fn set_has_artifact(&mut self, has_artifact: bool) {
        self.has_artifact = has_artifact;
    }

    pub fn begin_progress(&mut self, hint: &str) {
        self.progress = 0.0;
        self.hint = Some(hint.to_string());
    }

    pub fn set_progress(&mut self, fraction: f64) {
        self.progress = fraction.clamp(0.0, 1.0);
    }

    pub fn finish_progress(&mut self) {
        self.progress = 1.0;
        self.hint = None;
        self.player_visible = true;
    }

    pub fn abort_progress(&mut self) {
        self.progress = 0.0;
        self.hint = (!self.player_visible).then(|| IDLE_HINT.to_string());
    }

    /// Back to the state of a freshly opened window, keeping the error banner.
    pub fn reset_to_idle(&mut self) {
        self.has_artifact = false;
        self.player_visible = false;
        self.progress = 0.0;
        self.hint = Some(IDLE_HINT.to_string());
        self.play_presentation = PlayPresentation::Resume;
        let mut slider = self.slider.block_handler();
        slider.set_value(0.0);
        slider.set_range(0.0);
        slider.set_fill_level(0.0);
    }

    pub fn report(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    pub fn dismiss_error(&mut self) {
        self.last_error = None;
    }
}
