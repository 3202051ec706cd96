//! Error types for the MIDI-to-video application

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::playback_state::PlayerState;

/// Malformed or unreadable MIDI input.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("could not read MIDI file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse MIDI file {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },
    #[error("MIDI file {path} contains no notes")]
    NoNotes { path: PathBuf },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("render pipeline failed: {0}")]
    Pipeline(String),
    #[error("render I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("render cancelled")]
    Cancelled,
}

/// Failure of the parse -> render -> stage workflow.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Render(RenderError),
    #[error("could not stage {from} as {to}: {source}")]
    Stage {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not start conversion worker: {0}")]
    Spawn(#[source] io::Error),
    #[error("conversion worker exited without a result")]
    WorkerLost,
    #[error("conversion cancelled")]
    Cancelled,
}

impl From<RenderError> for ConversionError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Cancelled => ConversionError::Cancelled,
            other => ConversionError::Render(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not initialise media pipeline: {0}")]
    Init(String),
    #[error("could not load {path}: {reason}")]
    Load { path: PathBuf, reason: String },
    #[error("pipeline refused state {requested:?}")]
    StateChange { requested: PlayerState },
    #[error("seek to {position:.2}s failed")]
    Seek { position: f64 },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("rendered video {0} is missing")]
    MissingArtifact(PathBuf),
    #[error("export to {path} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Top-level error returned from `main`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("could not prepare working directory: {0}")]
    Workspace(#[source] io::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error(transparent)]
    Gui(#[from] eframe::Error),
}
