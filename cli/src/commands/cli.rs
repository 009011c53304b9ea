use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};
use depot_core::api::DeletionPolicy;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteChoice {
    All,
    Skip,
    Abort,
}

impl From<DeleteChoice> for DeletionPolicy {
    fn from(choice: DeleteChoice) -> Self {
        match choice {
            DeleteChoice::All => DeletionPolicy::DeleteAll,
            DeleteChoice::Skip => DeletionPolicy::SkipDeletion,
            DeleteChoice::Abort => DeletionPolicy::Abort,
        }
    }
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureChoice {
    Continue,
    Stop,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "depot", version, about = "Upload local exports and commit them to a remote workspace")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file. Defaults to ~/.depot/config.toml, then ./depot.toml.
    #[arg(long, global = true, env = "DEPOT_CONFIG")]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Reconcile remote files, upload local ones and commit them once.
    Upload(UploadArgs),
    /// Show the files the remote workspace already lists.
    List,
    /// Verify that the configured credentials reach the remote workspace.
    Check,
    /// Delete every file the remote workspace lists.
    Delete(DeleteArgs),
    /// Retry the commit for files uploaded by a run whose commit failed.
    Commit(CommitArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct UploadArgs {
    /// Directory scanned for files (non-recursive).
    #[arg(long)]
    pub source_dir: Option<PathBuf>,

    /// File extensions to pick up, without the dot.
    #[arg(long = "ext", value_delimiter = ',')]
    pub extensions: Vec<String>,

    /// What to do with files already on the remote side.
    /// - all: delete them before uploading
    /// - skip: keep them, new entries are appended
    /// - abort: stop without uploading
    #[arg(long = "delete", value_enum)]
    pub delete: Option<DeleteChoice>,

    /// Whether to keep going when some deletions fail.
    #[arg(long, value_enum)]
    pub on_delete_failure: Option<FailureChoice>,

    /// Upload only these file names.
    #[arg(long, value_delimiter = ',', conflicts_with = "select")]
    pub only: Vec<String>,

    /// Pick files interactively from a numbered list.
    #[arg(long)]
    pub select: bool,

    /// Assume yes for the final confirmation and never prompt.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DeleteArgs {
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct CommitArgs {
    /// Pending results file. Defaults to ~/.depot/pending_commit.json.
    #[arg(long)]
    pub pending_file: Option<PathBuf>,

    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_flags() {
        let args = Args::try_parse_from([
            "depot",
            "upload",
            "--ext",
            "xlsx,csv",
            "--delete",
            "all",
            "--on-delete-failure",
            "continue",
            "--only",
            "a.xlsx,b.xlsx",
            "-y",
        ])
        .unwrap();
        let Commands::Upload(upload) = args.command else {
            panic!("expected upload");
        };
        assert_eq!(upload.extensions, vec!["xlsx", "csv"]);
        assert_eq!(upload.delete, Some(DeleteChoice::All));
        assert_eq!(upload.on_delete_failure, Some(FailureChoice::Continue));
        assert_eq!(upload.only, vec!["a.xlsx", "b.xlsx"]);
        assert!(upload.yes);
        assert_eq!(DeletionPolicy::from(DeleteChoice::Skip), DeletionPolicy::SkipDeletion);
    }

    #[test]
    fn test_only_conflicts_with_select() {
        let err = Args::try_parse_from(["depot", "upload", "--only", "a.xlsx", "--select"]);
        assert!(err.is_err());
    }

    #[test]
    fn test_global_format_after_subcommand() {
        let args = Args::try_parse_from(["depot", "list", "--format", "json"]).unwrap();
        assert!(matches!(args.command, Commands::List));
        assert_eq!(args.format, OutputFormat::Json);
    }
}
