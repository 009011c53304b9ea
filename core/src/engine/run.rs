//! Orchestrator: read remote state, reconcile, upload file by file, commit once.
use std::sync::Arc;

use chrono::Utc;

use super::commit::{CommitAccumulator, CommitOutcome};
use super::grant::GrantSession;
use super::phase::{PhaseTransition, RunPhase};
use super::reconcile::{DeletionPolicy, DeletionReconciler, ReconcileOutcome};
use super::retry::{build_retry, RetryStrategy};
use super::traits::{BlobTransfer, RunDecider, RunObserver};
use super::types::{AbortReason, Backends, FileFailure, RunOutcome, RunReport, RunSummary};
use crate::asset::LocalAsset;
use crate::config::RetryConfig;
use crate::error::{EngineError, ErrorKind};
use crate::remote::{CommitDocument, RemoteAssetRecord, Session, UploadResult};

pub struct Orchestrator {
    backends: Backends,
    retry: Box<dyn RetryStrategy>,
}

impl Orchestrator {
    pub fn new(backends: Backends) -> Self {
        Self {
            backends,
            retry: build_retry(&RetryConfig::default()),
        }
    }

    pub fn with_retry(mut self, retry: Box<dyn RetryStrategy>) -> Self {
        self.retry = retry;
        self
    }

    /// Drive one run over `assets`, which must already be in upload order.
    ///
    /// Returns `Err` only when the remote state cannot be read. Everything
    /// else ends in a report, including rejected credentials mid-run
    /// (`AbortReason::Fatal`) and a rejected commit.
    pub async fn run(
        &self,
        session: &Session,
        assets: &[LocalAsset],
        decider: &dyn RunDecider,
        observer: &dyn RunObserver,
    ) -> Result<RunReport, EngineError> {
        let mut tracker = PhaseTracker::new(observer);
        tracing::info!(
            target: "depot.run",
            workspace = %session.workspace_id(),
            directory = %self.backends.directory.name(),
            files = assets.len(),
            retry = %self.retry.name(),
            "run.start"
        );

        tracker.advance(RunPhase::ReadingRemote);
        let (mut document, existing) = match self.read_remote(session).await {
            Ok(v) => v,
            Err(e) => {
                tracker.fatal(&e);
                return Err(e);
            }
        };

        tracker.advance(RunPhase::Reconciling);
        let reconcile = match self.reconcile(session, &existing, decider).await {
            Ok(Reconciled::Proceed(outcome)) => outcome,
            Ok(Reconciled::Stop(reason, outcome)) => {
                tracker.advance(RunPhase::Aborted);
                tracing::warn!(target: "depot.run", reason = ?reason, "run aborted before upload");
                return Ok(tracker.report(RunOutcome::Aborted(reason), outcome, Vec::new(), Vec::new()));
            }
            Err(e) => {
                tracker.fatal(&e);
                let mut report = tracker.report(
                    RunOutcome::Aborted(AbortReason::Fatal),
                    ReconcileOutcome::default(),
                    Vec::new(),
                    Vec::new(),
                );
                report.fatal_error = Some(e);
                return Ok(report);
            }
        };

        if reconcile.deleted_count() > 0 {
            // Deleted entries may still be listed in the first read; merge into a fresh copy.
            document = match self.read_document(session).await {
                Ok(d) => d,
                Err(e) => {
                    tracker.fatal(&e);
                    return Err(e);
                }
            };
        }

        let mut accumulator = CommitAccumulator::new();
        let mut failures = Vec::new();
        let mut fatal = None;
        {
            let broker = Arc::clone(&self.backends.broker);
            let transfer = Arc::clone(&self.backends.transfer);
            let mut grants = GrantSession::new(broker.as_ref(), session, &document);

            tracker.advance(RunPhase::Uploading(0));
            for (index, asset) in assets.iter().enumerate() {
                if index > 0 {
                    tracker.advance(RunPhase::Uploading(index));
                }
                observer.file_started(index, assets.len(), asset);

                match upload_one(&mut grants, transfer.as_ref(), self.retry.as_ref(), asset).await {
                    Ok(()) => {
                        tracing::info!(target: "depot.run", index = index, name = %asset.name, "file uploaded");
                        observer.file_finished(index, asset, None);
                        accumulator.record(UploadResult::succeeded(asset, Utc::now()));
                    }
                    Err(e) if e.kind().is_fatal() => {
                        observer.file_finished(index, asset, Some(&e));
                        failures.push(FileFailure::new(&asset.name, &e));
                        accumulator.record(UploadResult::failed(asset));
                        fatal = Some(e);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(
                            target: "depot.run",
                            index = index,
                            name = %asset.name,
                            error_kind = %e.kind(),
                            error_message = %e,
                            "file failed"
                        );
                        observer.file_finished(index, asset, Some(&e));
                        failures.push(FileFailure::new(&asset.name, &e));
                        accumulator.record(UploadResult::failed(asset));
                    }
                }
            }
            if fatal.is_none() && !assets.is_empty() {
                tracker.advance(RunPhase::Uploading(assets.len()));
            }
        }

        let results = accumulator.results().to_vec();
        if let Some(e) = fatal {
            // Files already transferred stay in the report; nothing is committed.
            tracker.fatal(&e);
            let mut report = tracker.report(
                RunOutcome::Aborted(AbortReason::Fatal),
                reconcile,
                results,
                failures,
            );
            report.fatal_error = Some(e);
            return Ok(report);
        }
        if accumulator.succeeded_count() == 0 {
            tracker.advance(RunPhase::Done);
            tracing::info!(target: "depot.run", "run.end: nothing to commit");
            return Ok(tracker.report(RunOutcome::Completed, reconcile, results, failures));
        }

        tracker.advance(RunPhase::Committing);
        let commit = Arc::clone(&self.backends.commit);
        match accumulator.commit(commit.as_ref(), session, document).await {
            Ok(CommitOutcome::Committed { entries, message }) => {
                tracker.advance(RunPhase::Done);
                tracing::info!(target: "depot.run", entries = entries, "run.end");
                let mut report = tracker.report(RunOutcome::Completed, reconcile, results, failures);
                report.summary.committed = true;
                report.commit_message = Some(message);
                Ok(report)
            }
            Ok(CommitOutcome::Skipped) => {
                tracker.advance(RunPhase::Done);
                Ok(tracker.report(RunOutcome::Completed, reconcile, results, failures))
            }
            Err(e) => {
                tracker.advance(RunPhase::Aborted);
                tracing::error!(
                    target: "depot.run",
                    error_kind = %e.kind(),
                    error_message = %e,
                    "commit failed after transfers; files are stored but not linked"
                );
                let mut report = tracker.report(
                    RunOutcome::Aborted(AbortReason::CommitFailed),
                    reconcile,
                    results,
                    failures,
                );
                report.commit_error = Some(e);
                Ok(report)
            }
        }
    }

    async fn read_document(&self, session: &Session) -> Result<CommitDocument, EngineError> {
        let document = self.backends.commit.read_document(session).await?;
        document.ensure_addressable()?;
        Ok(document)
    }

    async fn read_remote(
        &self,
        session: &Session,
    ) -> Result<(CommitDocument, Vec<RemoteAssetRecord>), EngineError> {
        let document = self.read_document(session).await?;
        let existing = match self.backends.directory.list(session).await {
            Ok(records) => records,
            Err(e) if e.kind() == ErrorKind::Parse => {
                tracing::warn!(target: "depot.run", error = %e, "remote listing unreadable, treating as empty");
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        tracing::info!(target: "depot.run", existing = existing.len(), "remote state read");
        Ok((document, existing))
    }

    async fn reconcile(
        &self,
        session: &Session,
        existing: &[RemoteAssetRecord],
        decider: &dyn RunDecider,
    ) -> Result<Reconciled, EngineError> {
        if existing.is_empty() {
            return Ok(Reconciled::Proceed(ReconcileOutcome::default()));
        }

        let policy = decider.deletion_policy(existing).await;
        if policy == DeletionPolicy::Abort {
            return Ok(Reconciled::Stop(AbortReason::PolicyAbort, ReconcileOutcome::default()));
        }

        let outcome = DeletionReconciler::new(self.backends.deleter.as_ref())
            .reconcile(session, existing, policy)
            .await?;
        if outcome.has_failures() && !decider.continue_after_failed_deletions(&outcome).await {
            return Ok(Reconciled::Stop(AbortReason::DeletionFailures, outcome));
        }
        Ok(Reconciled::Proceed(outcome))
    }
}

enum Reconciled {
    Proceed(ReconcileOutcome),
    Stop(AbortReason, ReconcileOutcome),
}

/// Grant then transfer, with a fresh grant for every attempt.
async fn upload_one(
    grants: &mut GrantSession<'_>,
    transfer: &dyn BlobTransfer,
    retry: &dyn RetryStrategy,
    asset: &LocalAsset,
) -> Result<(), EngineError> {
    let mut retries = 0u32;
    loop {
        let attempt = match grants.issue(&asset.name).await {
            Ok(grant) => transfer.transfer(asset, grant).await,
            Err(e) => Err(e),
        };
        let err = match attempt {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };
        match retry.next_delay(retries, &err) {
            Some(delay) => {
                tracing::warn!(
                    target: "depot.run",
                    name = %asset.name,
                    attempt = retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "retrying file"
                );
                tokio::time::sleep(delay).await;
                retries += 1;
            }
            None => return Err(err),
        }
    }
}

struct PhaseTracker<'a> {
    phase: RunPhase,
    observer: &'a dyn RunObserver,
}

impl<'a> PhaseTracker<'a> {
    fn new(observer: &'a dyn RunObserver) -> Self {
        Self {
            phase: RunPhase::Idle,
            observer,
        }
    }

    fn advance(&mut self, to: RunPhase) {
        if let Err(e) = PhaseTransition::validate(self.phase, to) {
            tracing::error!(target: "depot.run", error = %e, "unexpected phase transition");
        }
        tracing::debug!(target: "depot.run", from = %self.phase, to = %to, "phase");
        self.observer.phase_changed(self.phase, to);
        self.phase = to;
    }

    fn fatal(&mut self, e: &EngineError) {
        tracing::error!(
            target: "depot.run",
            phase = %self.phase,
            error_kind = %e.kind(),
            error_message = %e,
            "run aborted"
        );
        if !PhaseTransition::is_terminal(self.phase) {
            self.advance(RunPhase::Aborted);
        }
    }

    fn report(
        &self,
        outcome: RunOutcome,
        reconcile: ReconcileOutcome,
        results: Vec<UploadResult>,
        failures: Vec<FileFailure>,
    ) -> RunReport {
        let succeeded = results.iter().filter(|r| r.succeeded).count();
        RunReport {
            summary: RunSummary {
                files_attempted: results.len(),
                files_succeeded: succeeded,
                files_failed: results.len() - succeeded,
                deleted_count: reconcile.deleted_count(),
                committed: false,
            },
            phase: self.phase,
            outcome,
            results,
            failures,
            reconcile,
            commit_message: None,
            commit_error: None,
            fatal_error: None,
        }
    }
}
