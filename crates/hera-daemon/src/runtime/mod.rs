//! Container runtime boundary.
//!
//! The controller only needs three things from the runtime: an ordered event
//! stream, a listing of what is running now, and per-id inspection.

pub mod docker;

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use hera_core::ContainerDescriptor;
use hera_core::config::RuntimeMode;

pub use docker::DockerRuntime;

/// Ordered stream of runtime events. An `Err` item is terminal.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RuntimeEvent, RuntimeError>> + Send>>;

/// Errors raised by the runtime client.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("Unable to connect to the container runtime: {0}")]
    Connect(String),

    #[error("Unable to inspect {id}: {reason}")]
    Inspect { id: String, reason: String },

    #[error("Unable to list running workloads: {0}")]
    List(String),

    #[error("Event stream failed: {0}")]
    Events(String),
}

/// What an event means for tunnel management.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Workload started or changed: (re)provision its tunnel.
    Start,
    /// Workload went away: tear its tunnel down.
    Stop,
    /// Anything else.
    Ignored,
}

impl EventKind {
    /// Classify a runtime action for the given mode.
    ///
    /// Standalone containers use `start` / `die`; swarm services use
    /// `create` / `update` / `remove`.
    pub fn classify(mode: RuntimeMode, action: &str) -> Self {
        match (mode, action) {
            (RuntimeMode::Standalone, "start")
            | (RuntimeMode::Swarm, "create" | "update") => Self::Start,
            (RuntimeMode::Standalone, "die") | (RuntimeMode::Swarm, "remove") => Self::Stop,
            _ => Self::Ignored,
        }
    }
}

/// One runtime event, reduced to what the controller uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEvent {
    pub kind: EventKind,
    pub action: String,
    /// Container or service id the event is about.
    pub id: String,
}

impl RuntimeEvent {
    pub fn new(kind: EventKind, action: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind,
            action: action.into(),
            id: id.into(),
        }
    }
}

/// Container runtime client used by the controller.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Subscribe to lifecycle events.
    fn events(&self) -> EventStream;

    /// Ids of every currently running workload.
    async fn list_running(&self) -> Result<Vec<String>, RuntimeError>;

    /// Full metadata for one workload.
    async fn inspect(&self, id: &str) -> Result<ContainerDescriptor, RuntimeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_actions() {
        let m = RuntimeMode::Standalone;
        assert_eq!(EventKind::classify(m, "start"), EventKind::Start);
        assert_eq!(EventKind::classify(m, "die"), EventKind::Stop);
        assert_eq!(EventKind::classify(m, "stop"), EventKind::Ignored);
        assert_eq!(EventKind::classify(m, "create"), EventKind::Ignored);
        assert_eq!(EventKind::classify(m, "remove"), EventKind::Ignored);
    }

    #[test]
    fn swarm_actions() {
        let m = RuntimeMode::Swarm;
        assert_eq!(EventKind::classify(m, "create"), EventKind::Start);
        assert_eq!(EventKind::classify(m, "update"), EventKind::Start);
        assert_eq!(EventKind::classify(m, "remove"), EventKind::Stop);
        assert_eq!(EventKind::classify(m, "start"), EventKind::Ignored);
        assert_eq!(EventKind::classify(m, "die"), EventKind::Ignored);
    }
}
