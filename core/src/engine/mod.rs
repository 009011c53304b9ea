pub mod commit;
pub mod grant;
pub mod phase;
pub mod reconcile;
pub mod retry;
pub mod run;
pub mod traits;
pub mod types;

pub use commit::{CommitAccumulator, CommitOutcome};
pub use grant::{GrantSession, IssuedGrant};
pub use phase::{PhaseTransition, RunPhase, TransitionError};
pub use reconcile::{DeletionReconciler, ReconcileOutcome};
pub use retry::{build_retry, is_retryable, ExponentialBackoff, LinearRetry, RetryStrategy};
pub use run::Orchestrator;
pub use traits::{
    AssetDeleter, BatchOutcome, BlobTransfer, CommitReceipt, CommitTarget, FixedDecider,
    GrantBroker, NoopObserver, RemoteDirectory, RunDecider, RunObserver,
};
pub use types::{
    AbortReason, Backends, FileFailure, RunOutcome, RunReport, RunSummary, COMMIT_RECOVERY_HINT,
};
