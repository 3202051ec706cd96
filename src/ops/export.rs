use std::fs::File;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::ExportError;

/// Writes the staged video to a user-chosen destination.
pub trait Exporter {
    fn export(&self, artifact: &Path, destination: &Path) -> Result<(), ExportError>;
}

/// Copies into a temp file beside the destination, then persists it over the
/// destination so a failed export never leaves a truncated video behind.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileExporter;

impl Exporter for FileExporter {
    fn export(&self, artifact: &Path, destination: &Path) -> Result<(), ExportError> {
        if !artifact.is_file() {
            return Err(ExportError::MissingArtifact(artifact.to_path_buf()));
        }
        let io_err = |source| ExportError::Io {
            path: destination.to_path_buf(),
            source,
        };

        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let mut staging = tempfile::NamedTempFile::new_in(dir).map_err(io_err)?;
        let mut input = File::open(artifact).map_err(io_err)?;
        let bytes = io::copy(&mut input, staging.as_file_mut()).map_err(io_err)?;
        staging.as_file().sync_all().map_err(io_err)?;
        staging.persist(destination).map_err(|e| io_err(e.error))?;

        info!(bytes, "exported {}", destination.display());
        Ok(())
    }
}
