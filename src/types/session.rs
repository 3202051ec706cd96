use std::path::{Path, PathBuf};

use crate::types::playback_state::CachedDuration;

/// Mutable state shared by the transport, refresh loop, dispatcher and file workflows.
/// Owned by the controller and lent out by reference; nothing here is persisted.
#[derive(Debug, Clone, Default)]
pub struct Session {
    /// MIDI file of the last successful conversion.
    pub source: Option<PathBuf>,
    /// Staged video currently bound to the pipeline.
    pub artifact: Option<PathBuf>,
    pub duration: CachedDuration,
    destination: Option<PathBuf>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Export destination. Only the save workflow reads or writes it.
    pub fn destination(&self) -> Option<&Path> {
        self.destination.as_deref()
    }

    pub fn set_destination(&mut self, destination: PathBuf) {
        self.destination = Some(destination);
    }

    pub fn has_artifact(&self) -> bool {
        self.artifact.is_some()
    }
}
