use async_trait::async_trait;

use super::grant::IssuedGrant;
use super::reconcile::ReconcileOutcome;
use super::phase::RunPhase;
use crate::asset::LocalAsset;
use crate::config::DeletionPolicy;
use crate::error::EngineError;
use crate::remote::{CommitDocument, RemoteAssetRecord, Session, UploadGrant};

/// Lists what already exists on the remote side.
#[async_trait]
pub trait RemoteDirectory: Send + Sync {
    fn name(&self) -> &str;

    /// Cheap check that the session can reach the remote workspace.
    async fn check_access(&self, session: &Session) -> Result<(), EngineError>;

    /// All remote assets, every page exhausted. Zero records is success.
    async fn list(&self, session: &Session) -> Result<Vec<RemoteAssetRecord>, EngineError>;
}

/// Per-identifier result of one delete call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub deleted: Vec<String>,
    /// Identifier and the reason the remote gave.
    pub failed: Vec<(String, String)>,
}

#[async_trait]
pub trait AssetDeleter: Send + Sync {
    /// Upper bound on identifiers accepted by a single delete call.
    fn max_batch(&self) -> usize;

    /// Delete one batch. A not-found identifier must be reported as deleted.
    async fn delete_batch(
        &self,
        session: &Session,
        identifiers: &[String],
    ) -> Result<BatchOutcome, EngineError>;
}

#[async_trait]
pub trait GrantBroker: Send + Sync {
    /// Obtain a fresh single-use grant for `name`. `document` is the
    /// configuration read once at the start of the run.
    async fn request_grant(
        &self,
        session: &Session,
        document: &CommitDocument,
        name: &str,
    ) -> Result<UploadGrant, EngineError>;
}

#[async_trait]
pub trait BlobTransfer: Send + Sync {
    /// One attempt, no internal retry. Consumes the grant.
    async fn transfer(&self, asset: &LocalAsset, grant: IssuedGrant<'_>) -> Result<(), EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub message: String,
}

#[async_trait]
pub trait CommitTarget: Send + Sync {
    /// The authoritative configuration document.
    async fn read_document(&self, session: &Session) -> Result<CommitDocument, EngineError>;

    /// Submit the whole merged document.
    async fn commit(
        &self,
        session: &Session,
        document: &CommitDocument,
    ) -> Result<CommitReceipt, EngineError>;
}

/// Caller decisions the orchestrator cannot make on its own.
#[async_trait]
pub trait RunDecider: Send + Sync {
    /// Only asked when remote assets exist.
    async fn deletion_policy(&self, existing: &[RemoteAssetRecord]) -> DeletionPolicy;

    /// Asked when some deletions failed; `false` aborts before any upload.
    async fn continue_after_failed_deletions(&self, outcome: &ReconcileOutcome) -> bool;
}

/// Decisions fixed up front, for unattended runs.
#[derive(Debug, Clone, Copy)]
pub struct FixedDecider {
    pub policy: DeletionPolicy,
    pub continue_on_failure: bool,
}

#[async_trait]
impl RunDecider for FixedDecider {
    async fn deletion_policy(&self, _existing: &[RemoteAssetRecord]) -> DeletionPolicy {
        self.policy
    }

    async fn continue_after_failed_deletions(&self, _outcome: &ReconcileOutcome) -> bool {
        self.continue_on_failure
    }
}

/// Progress hooks. All methods default to no-ops.
pub trait RunObserver: Send + Sync {
    fn phase_changed(&self, _from: RunPhase, _to: RunPhase) {}

    fn file_started(&self, _index: usize, _total: usize, _asset: &LocalAsset) {}

    fn file_finished(&self, _index: usize, _asset: &LocalAsset, _error: Option<&EngineError>) {}
}

pub struct NoopObserver;

impl RunObserver for NoopObserver {}
