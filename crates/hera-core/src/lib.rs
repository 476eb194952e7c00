//! Hera Core Library
//!
//! Shared functionality for Hera components:
//! - Configuration loading and validation
//! - Container descriptors and tunnel label extraction
//! - Registrable (root) domain lookup
//! - Common error types

pub mod config;
pub mod container;
pub mod domain;
pub mod error;
pub mod tracing_init;

pub use config::HeraConfig;
pub use container::{ContainerDescriptor, TunnelLabels};
pub use error::{Error, Result};
