//! Deferred commit.
//!
//! Transfers only put bytes in storage. Nothing becomes visible on the remote
//! side until the accumulated results are merged into the configuration
//! document and that document is submitted, which happens once per run.

use super::traits::CommitTarget;
use crate::error::EngineError;
use crate::remote::{CommitDocument, Session, UploadResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// No transfer succeeded, so the document was not resubmitted.
    Skipped,
    Committed { entries: usize, message: String },
}

impl CommitOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }
}

/// Ordered per-file results for one run.
#[derive(Debug, Default)]
pub struct CommitAccumulator {
    results: Vec<UploadResult>,
}

impl CommitAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from results saved by an earlier run whose commit failed.
    pub fn from_results(results: Vec<UploadResult>) -> Self {
        Self { results }
    }

    pub fn record(&mut self, result: UploadResult) {
        self.results.push(result);
    }

    pub fn results(&self) -> &[UploadResult] {
        &self.results
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &UploadResult> {
        self.results.iter().filter(|r| r.succeeded)
    }

    pub fn succeeded_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.succeeded_count()
    }

    /// Merge successful results into `base` without submitting it.
    ///
    /// Entries are appended after whatever the listing already holds. A name
    /// that is already listed gets a second entry.
    pub fn merge_into(&self, base: &mut CommitDocument) -> Result<usize, EngineError> {
        let entries: Vec<_> = self.succeeded().map(UploadResult::to_listing_entry).collect();
        let added = entries.len();
        base.append_listing(entries)?;
        Ok(added)
    }

    /// Merge and submit once. Skips the remote call when nothing succeeded.
    pub async fn commit(
        self,
        target: &dyn CommitTarget,
        session: &Session,
        mut base: CommitDocument,
    ) -> Result<CommitOutcome, EngineError> {
        if self.succeeded_count() == 0 {
            tracing::info!(target: "depot.commit", "no successful transfers, commit skipped");
            return Ok(CommitOutcome::Skipped);
        }

        let entries = self.merge_into(&mut base)?;
        tracing::info!(
            target: "depot.commit",
            stage = "commit.in",
            entries = entries,
            listing_len = base.listing().len()
        );
        let receipt = target.commit(session, &base).await?;
        tracing::info!(target: "depot.commit", stage = "commit.out", message = %receipt.message);
        Ok(CommitOutcome::Committed {
            entries,
            message: receipt.message,
        })
    }
}
