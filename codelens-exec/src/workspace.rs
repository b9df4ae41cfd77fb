use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::{error::Error, languages::ARTIFACT_NAME, Result};

/// Prefix of every workspace directory name
pub const WORKSPACE_PREFIX: &str = "codelens-";

/// Disposable, exclusively owned directory for one execution
///
/// Holds the snippet's source file and, for compiled languages, the build
/// artifact. [`Workspace::release`] removes it on normal paths; `Drop`
/// removes it when the owner unwinds or is cancelled before releasing.
#[derive(Debug)]
pub struct Workspace {
    id: String,
    root_dir: PathBuf,
    source_path: PathBuf,
    released: bool,
}

impl Workspace {
    /// Create a fresh workspace under `base` and write `code` into
    /// `file_name` inside it.
    pub async fn acquire(base: &Path, file_name: &str, code: &str) -> Result<Self> {
        fs::create_dir_all(base).await.map_err(|e| {
            Error::Workspace(format!(
                "Failed to create workspace root {}: {}",
                base.display(),
                e
            ))
        })?;

        let id = Uuid::new_v4().to_string();
        let root_dir = base.join(format!("{}{}", WORKSPACE_PREFIX, id));

        // create, not create_all: an existing path means the name is taken
        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        builder.mode(0o700);
        builder.create(&root_dir).await.map_err(|e| {
            Error::Workspace(format!(
                "Failed to create workspace directory {}: {}",
                root_dir.display(),
                e
            ))
        })?;

        let workspace = Workspace {
            source_path: root_dir.join(file_name),
            root_dir,
            id,
            released: false,
        };

        fs::write(&workspace.source_path, code).await.map_err(|e| {
            Error::Workspace(format!(
                "Failed to write source file {}: {}",
                workspace.source_path.display(),
                e
            ))
        })?;

        debug!("Workspace {} ready at {}", workspace.id, workspace.root_dir.display());
        Ok(workspace)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.root_dir.join(ARTIFACT_NAME)
    }

    /// Recursively remove the workspace
    pub async fn release(mut self) -> Result<()> {
        match fs::remove_dir_all(&self.root_dir).await {
            Ok(()) => {
                self.released = true;
                debug!("Released workspace {}", self.id);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.released = true;
                warn!("Workspace {} was already gone", self.id);
                Ok(())
            }
            // leave `released` unset so Drop retries
            Err(e) => Err(Error::Workspace(format!(
                "Failed to remove workspace {}: {}",
                self.root_dir.display(),
                e
            ))),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        match std::fs::remove_dir_all(&self.root_dir) {
            Ok(()) => debug!("Workspace {} removed on drop", self.id),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => error!("Failed to clean up workspace directory: {}", e),
        }
    }
}
