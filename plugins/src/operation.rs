use depot_core::api::EngineError;

/// Which remote call failed. Decides how a failure maps onto the engine's
/// error taxonomy.
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    ReadDocument,
    List,
    Delete,
    Grant(&'a str),
    Transfer(&'a str),
    Commit,
}

impl Operation<'_> {
    /// Classify a failed call from its status and whether it was transient.
    pub fn classify(self, status: Option<u16>, transient: bool, text: String) -> EngineError {
        // A rejected upload request means the grant went stale, not the session.
        if let Operation::Transfer(name) = self {
            return EngineError::transfer_failed(name, text);
        }
        if matches!(status, Some(401) | Some(403)) {
            return EngineError::AuthInvalid(text);
        }
        if transient || matches!(status, Some(s) if s >= 500 || s == 429) {
            return EngineError::RemoteUnavailable(text);
        }
        self.rejected(text)
    }

    /// Error for a definite refusal of this call.
    pub fn rejected(self, text: String) -> EngineError {
        match self {
            Operation::Grant(name) => EngineError::grant_denied(name, text),
            Operation::Transfer(name) => EngineError::transfer_failed(name, text),
            Operation::Commit => EngineError::CommitRejected(text),
            Operation::ReadDocument | Operation::List | Operation::Delete => {
                EngineError::RemoteUnavailable(text)
            }
        }
    }

    pub fn timed_out(self, after_ms: u64) -> EngineError {
        self.classify(None, true, format!("no response after {after_ms} ms"))
    }
}
