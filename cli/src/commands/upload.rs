use std::path::PathBuf;

use depot_core::api::{
    build_retry, scan_directory, CliError, FixedDecider, LocalAsset, Orchestrator, RunReport,
};

use super::cli::{FailureChoice, OutputFormat, UploadArgs};
use super::{exit_code_for_kind, Remote};
use crate::pending::{self, PendingCommit};
use crate::progress::UploadProgress;
use crate::prompt::{self, PromptDecider};
use crate::render;

pub async fn handle_upload(
    args: UploadArgs,
    remote: &Remote,
    format: OutputFormat,
) -> Result<i32, CliError> {
    let cfg = &remote.cfg;
    let interactive = !args.yes && prompt::stdin_is_interactive();

    let source_dir = args
        .source_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.upload.source_dir));
    let extensions = if args.extensions.is_empty() {
        cfg.upload.extensions.clone()
    } else {
        args.extensions.clone()
    };

    let assets = select_assets(&args, scan_directory(&source_dir, &extensions)?).await?;
    if assets.is_empty() {
        eprintln!(
            "No files matching {} found in {}",
            extensions.join(", "),
            source_dir.display()
        );
        return Ok(0);
    }

    if interactive {
        eprintln!("Ready to upload {} file(s) from {}:", assets.len(), source_dir.display());
        for asset in &assets {
            eprintln!("  - {}", asset.name);
        }
        if !prompt::confirm_async("Proceed?".to_string()).await {
            eprintln!("Cancelled");
            return Ok(0);
        }
    }

    let decider = PromptDecider::new(
        args.delete.map(Into::into),
        args.on_delete_failure.map(|c| c == FailureChoice::Continue),
        interactive,
        FixedDecider {
            policy: cfg.upload.deletion_policy,
            continue_on_failure: cfg.upload.continue_on_deletion_failure,
        },
    );
    let show_progress = format == OutputFormat::Text && atty::is(atty::Stream::Stderr);
    let progress = UploadProgress::new(assets.len(), show_progress);

    let orchestrator =
        Orchestrator::new(remote.backends.clone()).with_retry(build_retry(&cfg.retry));
    let report = orchestrator
        .run(&remote.session, &assets, &decider, &progress)
        .await?;
    drop(progress);

    render::print_report(&report, format);
    if !report.pending_commit().is_empty() {
        save_pending(remote, &report)?;
    }
    Ok(exit_code_for_report(&report))
}

async fn select_assets(
    args: &UploadArgs,
    scanned: Vec<LocalAsset>,
) -> Result<Vec<LocalAsset>, CliError> {
    if args.select && !scanned.is_empty() {
        if !prompt::stdin_is_interactive() {
            return Err(CliError::Command(
                "--select needs an interactive terminal".to_string(),
            ));
        }
        return prompt::select_interactively_async(scanned).await;
    }
    prompt::select_by_names(scanned, &args.only)
}

fn save_pending(remote: &Remote, report: &RunReport) -> Result<(), CliError> {
    let path = pending::default_path()?;
    let pending = PendingCommit::new(
        remote.cfg.remote.backend.as_str(),
        remote.session.workspace_id(),
        report.pending_commit(),
    );
    let merged = pending::save_merged(&path, pending)?;
    eprintln!(
        "{} pending result(s) saved to {}",
        merged.results.len(),
        path.display()
    );
    Ok(())
}

/// 0 when everything went through, 3 when files are stored but not committed,
/// the error's own code when a fatal error ended the run, 2 for any other
/// partial or aborted run.
pub fn exit_code_for_report(report: &RunReport) -> i32 {
    if let Some(e) = &report.fatal_error {
        exit_code_for_kind(e.kind())
    } else if report.commit_failed() {
        3
    } else if report.fully_successful() {
        0
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_core::api::{
        AbortReason, EngineError, ReconcileOutcome, RunOutcome, RunPhase, RunSummary,
    };

    fn report(outcome: RunOutcome, failed: usize, committed: bool) -> RunReport {
        RunReport {
            summary: RunSummary {
                files_attempted: 2,
                files_succeeded: 2 - failed,
                files_failed: failed,
                deleted_count: 0,
                committed,
            },
            phase: RunPhase::Done,
            outcome,
            results: Vec::new(),
            failures: Vec::new(),
            reconcile: ReconcileOutcome::default(),
            commit_message: None,
            commit_error: None,
            fatal_error: None,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code_for_report(&report(RunOutcome::Completed, 0, true)), 0);
        assert_eq!(exit_code_for_report(&report(RunOutcome::Completed, 1, true)), 2);
        assert_eq!(exit_code_for_report(&report(RunOutcome::Completed, 2, false)), 2);
        assert_eq!(
            exit_code_for_report(&report(RunOutcome::Aborted(AbortReason::PolicyAbort), 0, false)),
            2
        );
        let mut rejected = report(RunOutcome::Aborted(AbortReason::CommitFailed), 0, false);
        rejected.commit_error = Some(EngineError::CommitRejected("HTTP 409".into()));
        assert_eq!(exit_code_for_report(&rejected), 3);
    }

    #[test]
    fn test_fatal_abort_exits_with_the_error_code() {
        let mut auth = report(RunOutcome::Aborted(AbortReason::Fatal), 1, false);
        auth.fatal_error = Some(EngineError::AuthInvalid("HTTP 401".into()));
        assert_eq!(exit_code_for_report(&auth), 30);

        let mut config = report(RunOutcome::Aborted(AbortReason::Fatal), 1, false);
        config.fatal_error = Some(EngineError::Config("no asset id".into()));
        assert_eq!(exit_code_for_report(&config), 11);
    }
}
