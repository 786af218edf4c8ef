//! Per-batch sandbox directory.
//!
//! Every batch works inside its own ULID-named subdirectory of the
//! configured sandbox root, so concurrent batches never race on file
//! names. The directory holds the source file, the compiled artifact, and
//! any compiler droppings; removing it at batch end is the whole cleanup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use ulid::Ulid;

/// Working directory owned by exactly one batch.
///
/// Call [`cleanup`](Self::cleanup) on every exit path; `Drop` is only a
/// backstop for early returns.
pub struct BatchSandbox {
    path: PathBuf,
    cleaned: bool,
}

impl BatchSandbox {
    /// Create a fresh unique subdirectory under `root`.
    pub fn create(root: &Path) -> Result<Self> {
        let path = root.join(Ulid::new().to_string());
        std::fs::create_dir_all(&path)
            .with_context(|| format!("failed to create batch sandbox at {}", path.display()))?;
        Ok(Self {
            path,
            cleaned: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the directory and everything in it. Failures are logged and
    /// swallowed; a leaked directory must never fail a batch.
    pub fn cleanup(mut self) {
        self.remove_all();
        self.cleaned = true;
    }

    fn remove_all(&self) {
        if let Err(error) = std::fs::remove_dir_all(&self.path) {
            warn!(
                path = %self.path.display(),
                %error,
                "failed to remove batch sandbox"
            );
        }
    }
}

impl Drop for BatchSandbox {
    fn drop(&mut self) {
        if !self.cleaned {
            self.remove_all();
        }
    }
}
