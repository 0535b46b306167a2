//! Scoped scratch directories for intermediate files.

use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// A uniquely named directory owned by one conversion call.
///
/// The directory is removed when the value is dropped unless [`ScratchDir::release`]
/// was asked to keep it. Removal errors are logged and never surface.
#[derive(Debug)]
pub struct ScratchDir {
    dir: Option<TempDir>,
    cleanup: bool,
}

impl ScratchDir {
    /// Create a scratch directory under `parent`, or the system temp dir.
    pub fn create(parent: Option<&Path>, cleanup: bool) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("docverter-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        debug!("Created scratch directory {:?}", dir.path());
        Ok(Self {
            dir: Some(dir),
            cleanup,
        })
    }

    pub fn path(&self) -> &Path {
        self.dir.as_ref().map_or(Path::new(""), TempDir::path)
    }

    /// Path of a file inside the scratch directory.
    pub fn join(&self, name: &str) -> PathBuf {
        self.path().join(name)
    }

    /// End the scope now: remove the directory, or keep it when cleanup is off.
    pub fn release(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.cleanup {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                warn!("Failed to remove scratch directory {:?}: {}", path, e);
            }
        } else {
            let kept = dir.keep();
            info!("Keeping scratch directory {:?}", kept);
        }
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        self.finish();
    }
}
