//! Service supervision error types.

use std::path::PathBuf;

use super::state::{ServiceOp, ServiceState};

/// Errors raised while driving the supervision toolset.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// An external supervision command could not be run or exited non-zero.
    #[error("Supervision command `{command}` failed: {reason}")]
    Command { command: String, reason: String },

    /// The requested operation is not legal from the current state.
    #[error("Cannot {op} a service that is {from}")]
    IllegalTransition { op: ServiceOp, from: ServiceState },

    /// Reading or writing the service directory failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SupervisorError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
