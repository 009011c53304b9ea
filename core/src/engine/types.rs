use std::sync::Arc;

use serde::Serialize;

use super::phase::RunPhase;
use super::reconcile::ReconcileOutcome;
use super::traits::{AssetDeleter, BlobTransfer, CommitTarget, GrantBroker, RemoteDirectory};
use crate::error::{EngineError, ErrorKind};
use crate::remote::UploadResult;

/// Everything the orchestrator talks to. One backend may fill several slots.
#[derive(Clone)]
pub struct Backends {
    pub directory: Arc<dyn RemoteDirectory>,
    pub deleter: Arc<dyn AssetDeleter>,
    pub broker: Arc<dyn GrantBroker>,
    pub transfer: Arc<dyn BlobTransfer>,
    pub commit: Arc<dyn CommitTarget>,
}

/// Counts rendered by callers at the end of every run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub files_attempted: usize,
    pub files_succeeded: usize,
    pub files_failed: usize,
    pub deleted_count: usize,
    pub committed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The caller chose to stop when remote assets were found.
    PolicyAbort,
    /// Some deletions failed and the caller chose not to continue.
    DeletionFailures,
    /// Files are in storage but the commit did not go through.
    CommitFailed,
    /// Rejected credentials or bad configuration stopped the run early.
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum RunOutcome {
    Completed,
    Aborted(AbortReason),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub name: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl FileFailure {
    pub fn new(name: impl Into<String>, error: &EngineError) -> Self {
        Self {
            name: name.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

pub const COMMIT_RECOVERY_HINT: &str =
    "files are already in storage; re-run the commit step instead of uploading them again";

#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub phase: RunPhase,
    pub outcome: RunOutcome,
    /// Per-file results in upload order.
    pub results: Vec<UploadResult>,
    pub failures: Vec<FileFailure>,
    pub reconcile: ReconcileOutcome,
    pub commit_message: Option<String>,
    pub commit_error: Option<EngineError>,
    /// The error that ended the run early, with `AbortReason::Fatal`.
    pub fatal_error: Option<EngineError>,
}

impl RunReport {
    /// Zero failed transfers and the commit went through.
    pub fn fully_successful(&self) -> bool {
        self.summary.files_failed == 0 && self.summary.committed
    }

    pub fn commit_failed(&self) -> bool {
        self.outcome == RunOutcome::Aborted(AbortReason::CommitFailed)
    }

    pub fn aborted_fatally(&self) -> bool {
        self.outcome == RunOutcome::Aborted(AbortReason::Fatal)
    }

    /// Successful results that still need to be committed.
    pub fn pending_commit(&self) -> Vec<UploadResult> {
        if !self.commit_failed() && !self.aborted_fatally() {
            return Vec::new();
        }
        self.results.iter().filter(|r| r.succeeded).cloned().collect()
    }

    pub fn recovery_hint(&self) -> Option<&'static str> {
        let stranded = self.commit_failed()
            || (self.aborted_fatally() && self.results.iter().any(|r| r.succeeded));
        stranded.then_some(COMMIT_RECOVERY_HINT)
    }
}
