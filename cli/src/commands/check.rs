use depot_core::api::CliError;

use super::cli::OutputFormat;
use super::Remote;

pub async fn handle_check(remote: &Remote, format: OutputFormat) -> Result<i32, CliError> {
    let backends = &remote.backends;
    backends.directory.check_access(&remote.session).await?;
    let document = backends.commit.read_document(&remote.session).await?;
    let listed = document.records().len();

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "ok": true,
                "backend": remote.cfg.remote.backend.as_str(),
                "workspace": remote.session.workspace_id(),
                "listed_files": listed,
            })
        ),
        OutputFormat::Text => println!(
            "OK: {} backend reaches workspace '{}' ({} file(s) listed)",
            remote.cfg.remote.backend.as_str(),
            remote.session.workspace_id(),
            listed
        ),
    }
    Ok(0)
}
