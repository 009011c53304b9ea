use depot_core::api::{CliError, CommitAccumulator, CommitOutcome};

use super::cli::{CommitArgs, OutputFormat};
use super::Remote;
use crate::{pending, prompt};

/// Commit results left behind by a run whose commit failed. The files are
/// already in storage; nothing is uploaded again.
pub async fn handle_commit(
    args: CommitArgs,
    remote: &Remote,
    format: OutputFormat,
) -> Result<i32, CliError> {
    let path = match args.pending_file {
        Some(p) => p,
        None => pending::default_path()?,
    };
    let Some(saved) = pending::load(&path)? else {
        if format == OutputFormat::Text {
            println!("Nothing pending in {}", path.display());
        }
        return Ok(0);
    };

    let backend = remote.cfg.remote.backend.as_str();
    if saved.backend != backend || saved.workspace_id != remote.session.workspace_id() {
        return Err(CliError::Command(format!(
            "pending results belong to {} workspace '{}', not {} workspace '{}'",
            saved.backend,
            saved.workspace_id,
            backend,
            remote.session.workspace_id()
        )));
    }

    if !args.yes && prompt::stdin_is_interactive() {
        let question = format!(
            "Commit {} file(s) saved at {} to workspace '{}'?",
            saved.results.len(),
            saved.created_at,
            saved.workspace_id
        );
        if !prompt::confirm_async(question).await {
            println!("Cancelled");
            return Ok(0);
        }
    }

    let accumulator = CommitAccumulator::from_results(saved.results);
    let target = remote.backends.commit.as_ref();
    let document = target.read_document(&remote.session).await?;
    document.ensure_addressable()?;

    let outcome = accumulator
        .commit(target, &remote.session, document)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "commit retry failed, pending results kept");
            CliError::Engine(e)
        })?;
    pending::clear(&path)?;

    match outcome {
        CommitOutcome::Skipped => {
            if format == OutputFormat::Text {
                println!("No successful uploads were pending");
            }
        }
        CommitOutcome::Committed { entries, message } => match format {
            OutputFormat::Json => println!(
                "{}",
                serde_json::json!({ "committed": true, "entries": entries, "message": message })
            ),
            OutputFormat::Text => println!("Committed {entries} file(s): {message}"),
        },
    }
    Ok(0)
}
