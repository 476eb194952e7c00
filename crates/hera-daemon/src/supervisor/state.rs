//! Supervision state machine.
//!
//! ```text
//! Unregistered --register--> SupervisedStopped --start--> SupervisedRunning
//!                                    ^                           |
//!                                    +----------stop-------------+
//! SupervisedRunning --restart--> SupervisedRunning
//! ```
//!
//! The state itself lives on disk (the `supervise/` directory) and in the
//! supervisor process; this module only decides which operations are legal.

use std::fmt;

use super::error::SupervisorError;

/// Observed state of one supervised tunnel service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// No `supervise/` directory: the scanner has never picked the service up.
    Unregistered,
    /// Supervised, process down.
    SupervisedStopped,
    /// Supervised, process up.
    SupervisedRunning,
}

/// Operations that move a service between states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOp {
    Register,
    Start,
    Stop,
    Restart,
}

impl ServiceState {
    pub const fn is_supervised(self) -> bool {
        !matches!(self, Self::Unregistered)
    }

    /// Compute the state reached by applying `op`, or reject the transition.
    pub fn apply(self, op: ServiceOp) -> Result<Self, SupervisorError> {
        match (self, op) {
            (Self::Unregistered, ServiceOp::Register) => Ok(Self::SupervisedStopped),
            (
                Self::SupervisedStopped | Self::SupervisedRunning,
                ServiceOp::Start | ServiceOp::Restart,
            ) => Ok(Self::SupervisedRunning),
            (Self::SupervisedStopped | Self::SupervisedRunning, ServiceOp::Stop) => {
                Ok(Self::SupervisedStopped)
            }
            (from, op) => Err(SupervisorError::IllegalTransition { op, from }),
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unregistered => write!(f, "unregistered"),
            Self::SupervisedStopped => write!(f, "supervised (stopped)"),
            Self::SupervisedRunning => write!(f, "supervised (running)"),
        }
    }
}

impl fmt::Display for ServiceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Register => write!(f, "register"),
            Self::Start => write!(f, "start"),
            Self::Stop => write!(f, "stop"),
            Self::Restart => write!(f, "restart"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ServiceOp::{Register, Restart, Start, Stop};
    use ServiceState::{SupervisedRunning, SupervisedStopped, Unregistered};

    #[test]
    fn register_only_from_unregistered() {
        assert_eq!(Unregistered.apply(Register).ok(), Some(SupervisedStopped));
        assert!(SupervisedStopped.apply(Register).is_err());
        assert!(SupervisedRunning.apply(Register).is_err());
    }

    #[test]
    fn nothing_but_register_from_unregistered() {
        for op in [Start, Stop, Restart] {
            let err = Unregistered.apply(op);
            assert!(
                matches!(
                    err,
                    Err(SupervisorError::IllegalTransition { from: Unregistered, .. })
                ),
                "{op} should be illegal from unregistered"
            );
        }
    }

    #[test]
    fn start_and_stop_between_supervised_states() {
        assert_eq!(SupervisedStopped.apply(Start).ok(), Some(SupervisedRunning));
        assert_eq!(SupervisedRunning.apply(Stop).ok(), Some(SupervisedStopped));
        assert_eq!(SupervisedStopped.apply(Stop).ok(), Some(SupervisedStopped));
        assert_eq!(SupervisedRunning.apply(Restart).ok(), Some(SupervisedRunning));
    }

    #[test]
    fn illegal_transition_message() {
        let err = SupervisedRunning.apply(Register).err();
        assert_eq!(
            err.map(|e| e.to_string()).as_deref(),
            Some("Cannot register a service that is supervised (running)")
        );
    }
}
