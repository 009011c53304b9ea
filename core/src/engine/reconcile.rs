use std::collections::BTreeSet;

use super::traits::AssetDeleter;
use crate::error::EngineError;
use crate::remote::{RemoteAssetRecord, Session};

pub use crate::config::DeletionPolicy;

/// Identifiers the remote confirmed gone, and those it did not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub deleted: BTreeSet<String>,
    pub failed: BTreeSet<String>,
}

impl ReconcileOutcome {
    pub fn deleted_count(&self) -> usize {
        self.deleted.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Applies a deletion policy to the remote assets found before an upload.
pub struct DeletionReconciler<'a> {
    deleter: &'a dyn AssetDeleter,
}

impl<'a> DeletionReconciler<'a> {
    pub fn new(deleter: &'a dyn AssetDeleter) -> Self {
        Self { deleter }
    }

    /// Delete every record in batches when the policy says so.
    ///
    /// Deleting something already gone counts as success. A batch that fails
    /// as a whole marks all of its identifiers failed unless the error is
    /// fatal, in which case it is returned.
    pub async fn reconcile(
        &self,
        session: &Session,
        existing: &[RemoteAssetRecord],
        policy: DeletionPolicy,
    ) -> Result<ReconcileOutcome, EngineError> {
        let mut outcome = ReconcileOutcome::default();
        if policy != DeletionPolicy::DeleteAll {
            tracing::info!(
                target: "depot.reconcile",
                policy = policy.as_str(),
                existing = existing.len(),
                "deletion skipped"
            );
            return Ok(outcome);
        }

        let identifiers: Vec<String> = existing
            .iter()
            .map(|r| r.identifier.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let batch_size = self.deleter.max_batch().max(1);

        for chunk in identifiers.chunks(batch_size) {
            tracing::debug!(target: "depot.reconcile", batch = chunk.len(), "delete batch");
            match self.deleter.delete_batch(session, chunk).await {
                Ok(batch) => {
                    outcome.deleted.extend(batch.deleted);
                    for (id, reason) in batch.failed {
                        tracing::warn!(target: "depot.reconcile", identifier = %id, reason = %reason, "delete failed");
                        outcome.failed.insert(id);
                    }
                    for id in chunk {
                        if !outcome.deleted.contains(id) && !outcome.failed.contains(id) {
                            tracing::warn!(
                                target: "depot.reconcile",
                                identifier = %id,
                                "identifier missing from delete response"
                            );
                            outcome.failed.insert(id.clone());
                        }
                    }
                }
                Err(e) if e.kind().is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "depot.reconcile", error = %e, batch = chunk.len(), "delete batch failed");
                    outcome.failed.extend(chunk.iter().cloned());
                }
            }
        }

        // An identifier reported both ways in separate responses ends up deleted.
        let deleted = outcome.deleted.clone();
        outcome.failed.retain(|id| !deleted.contains(id));

        tracing::info!(
            target: "depot.reconcile",
            deleted = outcome.deleted.len(),
            failed = outcome.failed.len(),
            "deletion finished"
        );
        Ok(outcome)
    }
}
