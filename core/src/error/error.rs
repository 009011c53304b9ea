use serde::Serialize;
use thiserror::Error;

/// Stable classification of engine failures, used for logging, retry and
/// exit-code decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AuthInvalid,
    RemoteUnavailable,
    GrantDenied,
    TransferFailed,
    CommitRejected,
    Parse,
    Io,
    Config,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AuthInvalid => "auth_invalid",
            Self::RemoteUnavailable => "remote_unavailable",
            Self::GrantDenied => "grant_denied",
            Self::TransferFailed => "transfer_failed",
            Self::CommitRejected => "commit_rejected",
            Self::Parse => "parse",
            Self::Io => "io",
            Self::Config => "config",
        }
    }

    /// Fatal kinds stop the whole run instead of being recorded per file.
    pub fn is_fatal(self) -> bool {
        matches!(self, Self::AuthInvalid | Self::Config)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("credentials rejected: {0}")]
    AuthInvalid(String),
    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("upload grant denied for '{name}': {reason}")]
    GrantDenied { name: String, reason: String },
    #[error("transfer failed for '{name}': {reason}")]
    TransferFailed { name: String, reason: String },
    #[error("commit rejected: {0}")]
    CommitRejected(String),
    #[error("malformed remote payload: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::AuthInvalid(_) => ErrorKind::AuthInvalid,
            Self::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            Self::GrantDenied { .. } => ErrorKind::GrantDenied,
            Self::TransferFailed { .. } => ErrorKind::TransferFailed,
            Self::CommitRejected(_) => ErrorKind::CommitRejected,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Io(_) => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn grant_denied(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::GrantDenied {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn transfer_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransferFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error("engine failed: {0}")]
    Engine(#[from] EngineError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}
