//! Orchestrator phases and the legal transitions between them.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    ReadingRemote,
    Reconciling,
    /// About to process file `i`; `Uploading(n)` with n = file count means the loop is done.
    Uploading(usize),
    Committing,
    Done,
    Aborted,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::ReadingRemote => f.write_str("reading-remote"),
            Self::Reconciling => f.write_str("reconciling"),
            Self::Uploading(i) => write!(f, "uploading({i})"),
            Self::Committing => f.write_str("committing"),
            Self::Done => f.write_str("done"),
            Self::Aborted => f.write_str("aborted"),
        }
    }
}

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: RunPhase, to: RunPhase },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: RunPhase },
}

pub struct PhaseTransition;

impl PhaseTransition {
    pub fn validate(from: RunPhase, to: RunPhase) -> Result<(), TransitionError> {
        if Self::is_terminal(from) {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (RunPhase::Idle, RunPhase::ReadingRemote) => true,
            (RunPhase::ReadingRemote, RunPhase::Reconciling) => true,
            (RunPhase::Reconciling, RunPhase::Uploading(0)) => true,
            (RunPhase::Uploading(i), RunPhase::Uploading(j)) => j == i + 1,
            // Commit is only entered after at least one success; otherwise straight to Done.
            (RunPhase::Uploading(_), RunPhase::Committing) => true,
            (RunPhase::Uploading(_), RunPhase::Done) => true,
            (RunPhase::Committing, RunPhase::Done) => true,
            (RunPhase::Idle, RunPhase::Aborted) => false,
            (_, RunPhase::Aborted) => true,
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    pub fn is_terminal(phase: RunPhase) -> bool {
        matches!(phase, RunPhase::Done | RunPhase::Aborted)
    }
}
