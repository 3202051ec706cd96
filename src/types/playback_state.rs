/// State of the media pipeline, lowest to highest.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PlayerState {
    /// No resources held.
    #[default]
    Idle,
    /// Resources held, not prerolled.
    Ready,
    Paused,
    Playing,
}

impl PlayerState {
    pub fn is_playing(self) -> bool {
        self == PlayerState::Playing
    }
}

/// What the play/pause button currently offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayPresentation {
    Resume,
    Pause,
}

impl PlayPresentation {
    pub fn label(self) -> &'static str {
        match self {
            PlayPresentation::Resume => "Play",
            PlayPresentation::Pause => "Pause",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            PlayPresentation::Resume => "▶",
            PlayPresentation::Pause => "⏸",
        }
    }
}

/// Duration of the loaded video, queried lazily from the pipeline.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum CachedDuration {
    #[default]
    Unknown,
    Known(f64),
}

impl CachedDuration {
    pub fn is_unknown(&self) -> bool {
        matches!(self, CachedDuration::Unknown)
    }

    pub fn seconds(&self) -> Option<f64> {
        match self {
            CachedDuration::Unknown => None,
            CachedDuration::Known(secs) => Some(*secs),
        }
    }
}
