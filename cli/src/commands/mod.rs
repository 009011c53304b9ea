pub mod check;
pub mod cli;
pub mod commit;
pub mod delete;
pub mod list;
pub mod upload;

use depot_core::api::{AppConfig, Backends, CliError, ErrorKind, Session};

/// Validated configuration plus the backend set and session built from it.
pub struct Remote {
    pub cfg: AppConfig,
    pub session: Session,
    pub backends: Backends,
}

impl Remote {
    pub async fn connect(cfg: AppConfig) -> Result<Self, CliError> {
        cfg.validate()?;
        let backends = depot_plugins::factory::build_backends(&cfg).await?;
        let session = cfg.session();
        tracing::debug!(
            backend = cfg.remote.backend.as_str(),
            workspace = %session.workspace_id(),
            "remote backends ready"
        );
        Ok(Self {
            cfg,
            session,
            backends,
        })
    }
}

/// Process exit code for an engine error of `kind`.
///
/// 2: partial failure, 3: commit rejected, 11: config, 20: IO,
/// 30: credentials rejected, 40: remote unavailable or unreadable.
pub fn exit_code_for_kind(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Config => 11,
        ErrorKind::Io => 20,
        ErrorKind::AuthInvalid => 30,
        ErrorKind::RemoteUnavailable | ErrorKind::Parse => 40,
        ErrorKind::CommitRejected => 3,
        ErrorKind::GrantDenied | ErrorKind::TransferFailed => 2,
    }
}
