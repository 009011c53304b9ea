mod common;

use std::sync::Arc;

use common::{assets, entry, names_in, session, FakeRemote, PhaseLog};
use depot_core::api::{
    build_retry, scan_directory, AbortReason, DeletionPolicy, ErrorKind, FixedDecider,
    NoopObserver, Orchestrator, RetryConfig, RunOutcome, RunPhase, RunSummary,
};
use pretty_assertions::assert_eq;

fn decider(policy: DeletionPolicy, continue_on_failure: bool) -> FixedDecider {
    FixedDecider {
        policy,
        continue_on_failure,
    }
}

#[tokio::test]
async fn three_files_into_empty_remote_commit_once() {
    let remote = Arc::new(FakeRemote::new());
    let orchestrator = Orchestrator::new(remote.backends());
    let files = assets(&["a.xlsx", "b.xlsx", "c.xlsx"]);

    let report = orchestrator
        .run(&session(), &files, &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(
        report.summary,
        RunSummary {
            files_attempted: 3,
            files_succeeded: 3,
            files_failed: 0,
            deleted_count: 0,
            committed: true,
        }
    );
    assert!(report.fully_successful());
    assert_eq!(report.phase, RunPhase::Done);

    let calls = remote.calls();
    assert_eq!(calls.grants, 3);
    assert_eq!(calls.transfers, 3);
    assert_eq!(calls.commits, 1);
    assert_eq!(calls.reads, 1);
    assert_eq!(calls.overlapping_grants, 0);
}

#[tokio::test]
async fn commit_keeps_unrelated_fields() {
    let remote = Arc::new(FakeRemote::new());
    let orchestrator = Orchestrator::new(remote.backends());

    orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    let committed = remote.committed();
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0]["owner"], "ops");
    assert_eq!(committed[0]["settings"]["chunking"], "auto");
    assert_eq!(names_in(&committed[0]), vec!["a.xlsx".to_string()]);
}

#[tokio::test]
async fn failed_transfers_are_left_out_of_the_commit() {
    let mut fake = FakeRemote::new();
    fake.fail_transfer.insert("b.xlsx".to_string());
    fake.fail_transfer.insert("d.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());
    let files = assets(&["a.xlsx", "b.xlsx", "c.xlsx", "d.xlsx", "e.xlsx"]);

    let report = orchestrator
        .run(&session(), &files, &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.summary.files_failed, 2);
    assert_eq!(report.summary.files_succeeded, 3);
    assert!(report.summary.committed);
    assert!(!report.fully_successful());
    assert_eq!(remote.calls().transfers, 5);
    assert_eq!(
        names_in(&remote.committed()[0]),
        vec!["a.xlsx".to_string(), "c.xlsx".to_string(), "e.xlsx".to_string()]
    );
    let failed: Vec<_> = report.failures.iter().map(|f| (f.name.as_str(), f.kind)).collect();
    assert_eq!(
        failed,
        vec![("b.xlsx", ErrorKind::TransferFailed), ("d.xlsx", ErrorKind::TransferFailed)]
    );
}

#[tokio::test]
async fn all_transfers_failing_skips_commit() {
    let mut fake = FakeRemote::new();
    for name in ["a.xlsx", "b.xlsx"] {
        fake.fail_transfer.insert(name.to_string());
    }
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx", "b.xlsx"]), &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.summary.files_failed, 2);
    assert!(!report.summary.committed);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.phase, RunPhase::Done);
    assert_eq!(remote.calls().commits, 0);
}

#[tokio::test]
async fn denied_grant_on_second_file_merges_the_other_two() {
    let mut fake = FakeRemote::new();
    fake.deny_grant.insert("b.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx", "b.xlsx", "c.xlsx"]), &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    let succeeded: Vec<bool> = report.results.iter().map(|r| r.succeeded).collect();
    assert_eq!(succeeded, vec![true, false, true]);
    assert_eq!(report.failures[0].kind, ErrorKind::GrantDenied);
    assert_eq!(remote.calls().transfers, 2);
    assert_eq!(
        names_in(&remote.committed()[0]),
        vec!["a.xlsx".to_string(), "c.xlsx".to_string()]
    );
}

#[tokio::test]
async fn delete_all_with_one_failure_continues_and_counts_one() {
    let mut fake = FakeRemote::with_listing(vec![entry("old-1.xlsx"), entry("old-2.xlsx")]);
    fake.reject_delete.insert("old-2.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::DeleteAll, true), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.summary.deleted_count, 1);
    assert!(report.reconcile.failed.contains("old-2.xlsx"));
    assert!(report.summary.committed);
    // The document is re-read after deletion, so the deleted entry is not resurrected.
    assert_eq!(remote.calls().reads, 2);
    assert_eq!(
        remote.listed_names(),
        vec!["old-2.xlsx".to_string(), "a.xlsx".to_string()]
    );
}

#[tokio::test]
async fn delete_failures_stop_the_run_when_caller_declines() {
    let mut fake = FakeRemote::with_listing(vec![entry("old-1.xlsx"), entry("old-2.xlsx")]);
    fake.reject_delete.insert("old-1.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::DeleteAll, false), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted(AbortReason::DeletionFailures));
    assert_eq!(report.phase, RunPhase::Aborted);
    assert_eq!(report.summary.deleted_count, 1);
    assert_eq!(report.summary.files_attempted, 0);
    let calls = remote.calls();
    assert_eq!(calls.grants, 0);
    assert_eq!(calls.commits, 0);
}

#[tokio::test]
async fn abort_policy_stops_before_any_upload() {
    let remote = Arc::new(FakeRemote::with_listing(vec![entry("old.xlsx")]));
    let orchestrator = Orchestrator::new(remote.backends());
    let phases = PhaseLog::default();

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::Abort, false), &phases)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted(AbortReason::PolicyAbort));
    assert_eq!(
        phases.phases(),
        vec![RunPhase::ReadingRemote, RunPhase::Reconciling, RunPhase::Aborted]
    );
    assert_eq!(remote.calls().delete_batches, 0);
    assert_eq!(remote.calls().grants, 0);
}

#[tokio::test]
async fn abort_policy_is_ignored_when_remote_is_empty() {
    let remote = Arc::new(FakeRemote::new());
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::Abort, false), &NoopObserver)
        .await
        .unwrap();

    assert!(report.fully_successful());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let remote = Arc::new(FakeRemote::with_listing(vec![entry("old.xlsx")]));
    let orchestrator = Orchestrator::new(remote.backends());
    let delete_all = decider(DeletionPolicy::DeleteAll, false);

    let first = orchestrator
        .run(&session(), &[], &delete_all, &NoopObserver)
        .await
        .unwrap();
    assert_eq!(first.summary.deleted_count, 1);

    // Same identifier again: the remote no longer has it and still reports deleted.
    let outcome = depot_core::api::DeletionReconciler::new(remote.as_ref())
        .reconcile(&session(), &first_records(&["old.xlsx"]), DeletionPolicy::DeleteAll)
        .await
        .unwrap();
    assert!(outcome.deleted.contains("old.xlsx"));
    assert!(outcome.failed.is_empty());
}

fn first_records(names: &[&str]) -> Vec<depot_core::api::RemoteAssetRecord> {
    names
        .iter()
        .map(|n| depot_core::api::RemoteAssetRecord {
            identifier: n.to_string(),
            display_name: n.to_string(),
            size_label: "Unknown".into(),
            uploaded_timestamp: "Unknown".into(),
        })
        .collect()
}

#[tokio::test]
async fn commit_rejection_is_reported_with_pending_results() {
    let mut fake = FakeRemote::new();
    fake.reject_commit = true;
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx", "b.xlsx"]), &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted(AbortReason::CommitFailed));
    assert_eq!(report.phase, RunPhase::Aborted);
    assert!(!report.summary.committed);
    assert_eq!(report.summary.files_succeeded, 2);
    assert_eq!(
        report.commit_error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::CommitRejected)
    );
    assert!(report.recovery_hint().is_some());
    assert_eq!(report.pending_commit().len(), 2);
    assert_eq!(remote.stored(), vec!["a.xlsx".to_string(), "b.xlsx".to_string()]);
}

#[tokio::test]
async fn rejected_credentials_during_transfer_end_the_run() {
    let mut fake = FakeRemote::new();
    fake.auth_fail_transfer.insert("b.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(
            &session(),
            &assets(&["a.xlsx", "b.xlsx", "c.xlsx"]),
            &decider(DeletionPolicy::SkipDeletion, false),
            &NoopObserver,
        )
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Aborted(AbortReason::Fatal));
    assert_eq!(report.phase, RunPhase::Aborted);
    assert_eq!(
        report.summary,
        RunSummary {
            files_attempted: 2,
            files_succeeded: 1,
            files_failed: 1,
            deleted_count: 0,
            committed: false,
        }
    );
    assert_eq!(
        report.fatal_error.as_ref().map(|e| e.kind()),
        Some(ErrorKind::AuthInvalid)
    );
    assert!(report.aborted_fatally());
    assert_eq!(report.failures[0].name, "b.xlsx");

    // a.xlsx is stored but unlinked, so it stays recoverable.
    let pending = report.pending_commit();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].name, "a.xlsx");
    assert!(report.recovery_hint().is_some());

    let calls = remote.calls();
    assert_eq!(calls.transfers, 2);
    assert_eq!(calls.commits, 0);
    assert_eq!(remote.stored(), vec!["a.xlsx".to_string()]);
}

#[tokio::test]
async fn transient_transfer_failures_get_a_fresh_grant_per_attempt() {
    let mut fake = FakeRemote::new();
    fake.fail_transfer.insert("a.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends()).with_retry(build_retry(&RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        strategy: "linear".into(),
    }));

    let report = orchestrator
        .run(
            &session(),
            &assets(&["a.xlsx", "b.xlsx"]),
            &decider(DeletionPolicy::SkipDeletion, false),
            &NoopObserver,
        )
        .await
        .unwrap();

    assert_eq!(report.summary.files_failed, 1);
    assert_eq!(report.summary.files_succeeded, 1);
    assert!(report.summary.committed);

    let calls = remote.calls();
    // Three attempts for a.xlsx, one for b.xlsx.
    assert_eq!(calls.grants, 4);
    assert_eq!(calls.transfers, 4);
    assert_eq!(calls.overlapping_grants, 0);
    assert_eq!(calls.commits, 1);
    assert_eq!(remote.listed_names(), vec!["b.xlsx".to_string()]);
}

#[tokio::test]
async fn denied_grants_are_not_retried() {
    let mut fake = FakeRemote::new();
    fake.deny_grant.insert("a.xlsx".to_string());
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends()).with_retry(build_retry(&RetryConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
        strategy: "exponential-backoff".into(),
    }));

    let report = orchestrator
        .run(
            &session(),
            &assets(&["a.xlsx", "b.xlsx"]),
            &decider(DeletionPolicy::SkipDeletion, false),
            &NoopObserver,
        )
        .await
        .unwrap();

    assert_eq!(report.failures[0].kind, ErrorKind::GrantDenied);
    let calls = remote.calls();
    assert_eq!(calls.grants, 2);
    assert_eq!(calls.transfers, 1);
    assert_eq!(calls.overlapping_grants, 0);
    assert_eq!(calls.commits, 1);
}

#[tokio::test]
async fn unreadable_listing_is_treated_as_empty() {
    let mut fake = FakeRemote::with_listing(vec![entry("old.xlsx")]);
    fake.unreadable_listing = true;
    let remote = Arc::new(fake);
    let orchestrator = Orchestrator::new(remote.backends());

    let report = orchestrator
        .run(&session(), &assets(&["a.xlsx"]), &decider(DeletionPolicy::Abort, false), &NoopObserver)
        .await
        .unwrap();

    assert!(report.fully_successful());
    assert_eq!(remote.calls().delete_batches, 0);
}

#[tokio::test]
async fn phases_follow_the_file_order() {
    let remote = Arc::new(FakeRemote::new());
    let orchestrator = Orchestrator::new(remote.backends());
    let phases = PhaseLog::default();

    orchestrator
        .run(&session(), &assets(&["a.xlsx", "b.xlsx"]), &decider(DeletionPolicy::SkipDeletion, false), &phases)
        .await
        .unwrap();

    assert_eq!(
        phases.phases(),
        vec![
            RunPhase::ReadingRemote,
            RunPhase::Reconciling,
            RunPhase::Uploading(0),
            RunPhase::Uploading(1),
            RunPhase::Uploading(2),
            RunPhase::Committing,
            RunPhase::Done,
        ]
    );
}

#[tokio::test]
async fn uploaded_files_are_listed_after_commit() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("suite-b.xlsx"), b"b").unwrap();
    std::fs::write(dir.path().join("suite-a.xlsx"), b"a").unwrap();
    std::fs::write(dir.path().join("notes.txt"), b"skip").unwrap();
    let files = scan_directory(dir.path(), &["xlsx".to_string()]).unwrap();

    let remote = Arc::new(FakeRemote::new());
    let orchestrator = Orchestrator::new(remote.backends());
    orchestrator
        .run(&session(), &files, &decider(DeletionPolicy::SkipDeletion, false), &NoopObserver)
        .await
        .unwrap();

    let listed: Vec<String> = depot_core::api::RemoteDirectory::list(remote.as_ref(), &session())
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.display_name)
        .collect();
    assert_eq!(listed, vec!["suite-a.xlsx".to_string(), "suite-b.xlsx".to_string()]);
}
