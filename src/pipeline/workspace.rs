//! Per-run scratch directory for temporary artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::error::Result;

/// A unique temporary directory owned by one pipeline run.
///
/// The directory and everything in it is removed exactly once, either by
/// [`Workspace::release`] or when the workspace is dropped. Removal failures
/// are logged, never returned.
#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl Workspace {
    /// Create a fresh workspace under the system temporary directory.
    pub fn create() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("pdfmend-").tempdir()?;
        Ok(Self::from_dir(dir))
    }

    /// Create a fresh workspace inside `parent`.
    pub fn create_in<P: AsRef<Path>>(parent: P) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pdfmend-")
            .tempdir_in(parent)?;
        Ok(Self::from_dir(dir))
    }

    fn from_dir(dir: TempDir) -> Self {
        let path = dir.path().to_path_buf();
        log::debug!("Workspace created at {}", path.display());
        Self {
            dir: Some(dir),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path for a named artifact inside the workspace.
    pub fn artifact(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Delete one artifact now, logging a failure instead of returning it.
    pub fn remove_artifact(&self, path: &Path) {
        remove_logged(path);
    }

    /// Delete the workspace directory.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if let Some(dir) = self.dir.take() {
            match dir.close() {
                Ok(()) => log::debug!("Workspace {} released", self.path.display()),
                Err(e) => log::warn!(
                    "Failed to remove workspace {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Remove a file if it exists; failures are logged as warnings.
pub fn remove_logged(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => log::debug!("Removed {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_removes_directory() {
        let ws = Workspace::create().unwrap();
        let path = ws.path().to_path_buf();
        fs::write(ws.artifact("a.pdf"), b"x").unwrap();
        assert!(path.exists());

        ws.release();
        assert!(!path.exists());
    }

    #[test]
    fn test_drop_removes_directory() {
        let parent = tempfile::tempdir().unwrap();
        let path = {
            let ws = Workspace::create_in(parent.path()).unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn test_workspaces_are_unique() {
        let a = Workspace::create().unwrap();
        let b = Workspace::create().unwrap();
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_remove_artifact_tolerates_missing() {
        let ws = Workspace::create().unwrap();
        let artifact = ws.artifact("strip.pdf");
        ws.remove_artifact(&artifact);
        fs::write(&artifact, b"x").unwrap();
        ws.remove_artifact(&artifact);
        assert!(!artifact.exists());
    }
}
