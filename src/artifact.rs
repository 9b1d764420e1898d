use std::path::PathBuf;
use tracing::{debug, warn};

use crate::pipeline::Stage;

/// A file-system artifact produced by a pipeline stage. Temporary artifacts
/// may be removed at job end; final artifacts never are.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub stage: Stage,
    pub temporary: bool,
}

impl Artifact {
    pub fn temporary<P: Into<PathBuf>>(path: P, stage: Stage) -> Self {
        Self {
            path: path.into(),
            stage,
            temporary: true,
        }
    }

    pub fn final_output<P: Into<PathBuf>>(path: P, stage: Stage) -> Self {
        Self {
            path: path.into(),
            stage,
            temporary: false,
        }
    }
}

/// Tracks every artifact a job produces so cleanup can run once the job
/// reaches a terminal state, success or failure.
#[derive(Debug, Default)]
pub struct ArtifactTracker {
    artifacts: Vec<Artifact>,
}

impl ArtifactTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, artifact: Artifact) {
        debug!(
            "Tracking artifact from {}: {} (temporary: {})",
            artifact.stage,
            artifact.path.display(),
            artifact.temporary
        );
        self.artifacts.push(artifact);
    }

    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }

    /// Delete every temporary artifact. Final outputs are never touched.
    /// Returns the number of artifacts removed; individual failures are
    /// logged and skipped.
    pub async fn remove_temporary(&self) -> u64 {
        let mut removed = 0;

        for artifact in self.artifacts.iter().filter(|a| a.temporary) {
            if !artifact.path.exists() {
                continue;
            }

            let result = if artifact.path.is_dir() {
                tokio::fs::remove_dir_all(&artifact.path).await
            } else {
                tokio::fs::remove_file(&artifact.path).await
            };

            match result {
                Ok(()) => {
                    debug!("Removed temporary artifact: {}", artifact.path.display());
                    removed += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to remove temporary artifact {}: {}",
                        artifact.path.display(),
                        e
                    );
                }
            }
        }

        removed
    }

    /// True when no tracked temporary artifact still exists on disk.
    pub fn temporary_absent(&self) -> bool {
        self.artifacts
            .iter()
            .filter(|a| a.temporary)
            .all(|a| !a.path.exists())
    }
}
