//! Upload results whose commit did not go through.
//!
//! Saved after a rejected commit or a fatal abort so `depot commit` can
//! link the stored files without uploading them again. Later runs add to
//! the file instead of replacing it.

use std::path::{Path, PathBuf};

use chrono::Utc;
use depot_core::api::{get_depot_data_dir, CliError, UploadResult};
use serde::{Deserialize, Serialize};

pub const PENDING_FILE_NAME: &str = "pending_commit.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCommit {
    pub backend: String,
    pub workspace_id: String,
    pub created_at: String,
    pub results: Vec<UploadResult>,
}

impl PendingCommit {
    pub fn new(backend: &str, workspace_id: &str, results: Vec<UploadResult>) -> Self {
        Self {
            backend: backend.to_string(),
            workspace_id: workspace_id.to_string(),
            created_at: Utc::now().to_rfc3339(),
            results,
        }
    }

    pub fn same_target(&self, other: &PendingCommit) -> bool {
        self.backend == other.backend && self.workspace_id == other.workspace_id
    }

    /// Add `newer` results; a name already pending takes the newer entry.
    pub fn merge(&mut self, newer: PendingCommit) {
        for result in newer.results {
            match self.results.iter_mut().find(|r| r.name == result.name) {
                Some(existing) => *existing = result,
                None => self.results.push(result),
            }
        }
        self.created_at = newer.created_at;
    }
}

pub fn default_path() -> Result<PathBuf, CliError> {
    Ok(get_depot_data_dir()?.join(PENDING_FILE_NAME))
}

pub fn save(path: &Path, pending: &PendingCommit) -> Result<(), CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let body = serde_json::to_string_pretty(pending)
        .map_err(|e| CliError::Command(format!("encode pending commit: {e}")))?;
    std::fs::write(path, body)?;
    tracing::info!(path = %path.display(), files = pending.results.len(), "pending commit saved");
    Ok(())
}

/// Merge `pending` into whatever is already saved at `path` and write the
/// result. Results for another backend or workspace are never overwritten.
pub fn save_merged(path: &Path, pending: PendingCommit) -> Result<PendingCommit, CliError> {
    let merged = match load(path)? {
        Some(mut existing) if existing.same_target(&pending) => {
            existing.merge(pending);
            existing
        }
        Some(existing) => {
            return Err(CliError::Command(format!(
                "{} already holds pending results for {} workspace '{}'; run `depot commit` for it first",
                path.display(),
                existing.backend,
                existing.workspace_id
            )));
        }
        None => pending,
    };
    save(path, &merged)?;
    Ok(merged)
}

/// `None` when nothing is pending.
pub fn load(path: &Path) -> Result<Option<PendingCommit>, CliError> {
    let body = match std::fs::read_to_string(path) {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let pending = serde_json::from_str(&body).map_err(|e| {
        CliError::Command(format!("pending commit file {} is corrupt: {e}", path.display()))
    })?;
    Ok(Some(pending))
}

pub fn clear(path: &Path) -> Result<(), CliError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
