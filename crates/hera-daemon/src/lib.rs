//! Hera daemon library
//!
//! Watches the container runtime and keeps one supervised tunnel process per
//! labelled container:
//! - Runtime events and inspection (Docker, standalone or swarm)
//! - Hostname resolution with retry
//! - Origin certificate matching by root domain
//! - s6 service directories and their state machine

pub mod certificate;
pub mod controller;
pub mod resolver;
pub mod runtime;
pub mod supervisor;
pub mod tunnel;

pub use controller::{ControllerError, StartOutcome, StopOutcome, TunnelController, TunnelError};
