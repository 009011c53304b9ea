use depot_core::api::{CliError, DeletionPolicy, DeletionReconciler};

use super::cli::{DeleteArgs, OutputFormat};
use super::Remote;
use crate::{prompt, render};

pub async fn handle_delete(
    args: DeleteArgs,
    remote: &Remote,
    format: OutputFormat,
) -> Result<i32, CliError> {
    let records = remote.backends.directory.list(&remote.session).await?;
    if records.is_empty() {
        if format == OutputFormat::Text {
            println!("Nothing to delete");
        }
        return Ok(0);
    }

    if !args.yes {
        if !prompt::stdin_is_interactive() {
            return Err(CliError::Command(
                "refusing to delete without --yes when stdin is not a terminal".to_string(),
            ));
        }
        render::print_records(&records, OutputFormat::Text);
        if !prompt::confirm_async(format!("Delete all {} file(s)?", records.len())).await {
            println!("Cancelled");
            return Ok(0);
        }
    }

    let reconciler = DeletionReconciler::new(remote.backends.deleter.as_ref());
    let outcome = reconciler
        .reconcile(&remote.session, &records, DeletionPolicy::DeleteAll)
        .await?;
    render::print_reconcile(&outcome, format);

    Ok(if outcome.has_failures() { 2 } else { 0 })
}
