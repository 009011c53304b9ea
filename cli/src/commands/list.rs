use depot_core::api::CliError;

use super::cli::OutputFormat;
use super::Remote;
use crate::render;

pub async fn handle_list(remote: &Remote, format: OutputFormat) -> Result<i32, CliError> {
    let records = remote.backends.directory.list(&remote.session).await?;
    render::print_records(&records, format);
    Ok(0)
}
