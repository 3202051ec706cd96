use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::error::ConversionError;
use crate::types::config::AppConfig;

const WORK_NAME: &str = "render.mp4";
/// Marker appended to the working name once the render is complete.
const STAGE_MARKER: char = '~';

/// The two fixed locations a rendered video passes through.
///
/// The renderer writes `work`; only a complete render is renamed to `staged`,
/// which is the name handed to the playback pipeline and the exporter. The
/// rename is atomic on a single POSIX filesystem and best-effort elsewhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub work: PathBuf,
    pub staged: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        let work = dir.join(WORK_NAME);
        let mut staged = work.clone().into_os_string();
        staged.push(STAGE_MARKER.to_string());
        Self {
            work,
            staged: PathBuf::from(staged),
        }
    }

    /// Rename the finished working file to its staged name.
    pub fn stage(&self) -> Result<&Path, ConversionError> {
        fs::rename(&self.work, &self.staged).map_err(|source| ConversionError::Stage {
            from: self.work.clone(),
            to: self.staged.clone(),
            source,
        })?;
        Ok(&self.staged)
    }

    pub fn discard_work(&self) {
        remove_quietly(&self.work);
    }

    /// Remove the staged video only. The working file belongs to a running
    /// conversion until it is staged.
    pub fn remove_staged(&self) {
        remove_quietly(&self.staged);
    }

    /// Remove both files; missing files and other failures are ignored.
    pub fn remove_all(&self) {
        remove_quietly(&self.staged);
        remove_quietly(&self.work);
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!("removed {}", path.display()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => debug!("could not remove {}: {err}", path.display()),
    }
}

/// Directory holding the artifacts for the lifetime of the process.
#[derive(Debug)]
pub struct Workspace {
    paths: ArtifactPaths,
    /// Deleted with everything in it on drop.
    _temp: Option<TempDir>,
}

impl Workspace {
    pub fn create(config: &AppConfig) -> io::Result<Self> {
        match &config.work_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Self {
                    paths: ArtifactPaths::in_dir(dir),
                    _temp: None,
                })
            }
            None => {
                let temp = tempfile::Builder::new().prefix("midiroll-").tempdir()?;
                Ok(Self {
                    paths: ArtifactPaths::in_dir(temp.path()),
                    _temp: Some(temp),
                })
            }
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.paths.remove_all();
    }
}
