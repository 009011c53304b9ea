//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `depot_core::api` instead of reaching into internal modules.

pub use crate::asset::{content_type_for, scan_directory, size_label, LocalAsset};
pub use crate::config::{
    apply_env_overrides, get_depot_data_dir, load_default, load_path, AppConfig, BackendKind,
    ControlPlaneConfig, DeletionPolicy, LoggingConfig, ObjectStoreConfig, RemoteConfig,
    RetryConfig, TimeoutConfig, UploadConfig,
};
pub use crate::engine::{
    build_retry, AbortReason, AssetDeleter, Backends, BatchOutcome, BlobTransfer,
    CommitAccumulator, CommitOutcome, CommitReceipt, CommitTarget, DeletionReconciler,
    FileFailure, FixedDecider, GrantBroker, GrantSession, IssuedGrant, NoopObserver,
    Orchestrator, ReconcileOutcome, RemoteDirectory, RetryStrategy, RunDecider, RunObserver,
    RunOutcome, RunPhase, RunReport, RunSummary, COMMIT_RECOVERY_HINT,
};
pub use crate::error::{CliError, EngineError, ErrorKind};
pub use crate::remote::{
    CommitDocument, GrantMethod, ListingLocator, RemoteAssetRecord, Session, UploadGrant,
    UploadResult, UPLOADED_TIMESTAMP_FORMAT,
};
