//! Per-run ledger of transient files.
//!
//! Every temporary artifact is allocated through the ledger. Cleanup runs
//! exactly once: explicitly through [`ResourceLedger::finish`], or from
//! `Drop` if the run was abandoned.

use std::io;
use std::path::{Path, PathBuf};

use slidecast_common::error::ResourceCleanupWarning;

#[derive(Debug)]
pub struct ResourceLedger {
    root: PathBuf,
    artifacts: Vec<PathBuf>,
    cleanup: bool,
    finished: bool,
}

impl ResourceLedger {
    /// Create the workspace `<workspace_root>/job_<id>`.
    pub fn create(workspace_root: &Path, job_id: &str, cleanup: bool) -> io::Result<Self> {
        let root = workspace_root.join(format!("job_{job_id}"));
        std::fs::create_dir_all(&root)?;
        tracing::debug!(workspace = %root.display(), "Created job workspace");
        Ok(Self {
            root,
            artifacts: Vec::new(),
            cleanup,
            finished: false,
        })
    }

    /// Reserve a path inside the workspace and track it.
    pub fn allocate(&mut self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        self.artifacts.push(path.clone());
        path
    }

    /// Remove every tracked artifact and the workspace. Problems are
    /// returned as warnings, never as errors.
    pub fn finish(mut self) -> Vec<ResourceCleanupWarning> {
        self.cleanup_now()
    }

    fn cleanup_now(&mut self) -> Vec<ResourceCleanupWarning> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        if !self.cleanup {
            tracing::info!(workspace = %self.root.display(), "Cleanup disabled, keeping workspace");
            return Vec::new();
        }

        let mut warnings = Vec::new();
        for path in self.artifacts.drain(..) {
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warnings.push(ResourceCleanupWarning {
                    path,
                    message: e.to_string(),
                }),
            }
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warnings.push(ResourceCleanupWarning {
                path: self.root.clone(),
                message: e.to_string(),
            }),
        }
        tracing::debug!(workspace = %self.root.display(), warnings = warnings.len(), "Workspace cleaned");
        warnings
    }
}

impl Drop for ResourceLedger {
    fn drop(&mut self) {
        for warning in self.cleanup_now() {
            tracing::warn!(%warning, "Cleanup warning");
        }
    }
}
