//! Per-execution host workspace
//!
//! Every execution gets a fresh directory below the configured workspace
//! root. The directory is bind-mounted into the sandbox and removed on every
//! exit path: explicitly through [`Workspace::close`], or on drop.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::driver::Driver;

const PREFIX: &str = "codejudge-";

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("workspace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A uniquely named temp directory holding one execution's files
///
/// Removal happens on drop. Call [`close()`](Self::close) to observe removal
/// errors instead of ignoring them.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a new workspace below `root`, creating `root` if needed
    #[instrument]
    pub fn create(root: &Path) -> Result<Self, WorkspaceError> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new().prefix(PREFIX).tempdir_in(root)?;
        debug!(path = ?dir.path(), "workspace created");
        Ok(Self { dir })
    }

    /// Host path of the workspace directory
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Get the host path to a file inside the workspace
    ///
    /// Returns an error if the name would escape the workspace.
    pub fn file_path(&self, name: &str) -> Result<PathBuf, WorkspaceError> {
        if name.is_empty() || name.contains("..") || name.starts_with('/') || name.contains('\\')
        {
            return Err(WorkspaceError::InvalidPath(format!(
                "path traversal not allowed: {name}"
            )));
        }
        Ok(self.dir.path().join(name))
    }

    /// Write a file into the workspace
    #[instrument(skip(self, content))]
    pub async fn write_file(&self, name: &str, content: &[u8]) -> Result<(), WorkspaceError> {
        let path = self.file_path(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;
        debug!(?path, len = content.len(), "wrote file to workspace");
        Ok(())
    }

    /// Write every file of a synthesized driver
    pub async fn write_driver(&self, driver: &Driver) -> Result<(), WorkspaceError> {
        for file in &driver.files {
            self.write_file(&file.name, file.contents.as_bytes()).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub async fn read_file(&self, name: &str) -> Result<Vec<u8>, WorkspaceError> {
        let path = self.file_path(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// uid and gid owning the workspace directory
    #[cfg(unix)]
    pub fn owner(&self) -> Result<(u32, u32), WorkspaceError> {
        use std::os::unix::fs::MetadataExt;

        let metadata = std::fs::metadata(self.dir.path())?;
        Ok((metadata.uid(), metadata.gid()))
    }

    /// Remove the workspace, reporting failures
    #[must_use = "cleanup errors should be handled"]
    #[instrument(skip(self), fields(path = ?self.dir.path()))]
    pub fn close(self) -> Result<(), WorkspaceError> {
        self.dir.close()?;
        debug!("workspace removed");
        Ok(())
    }
}
