//! Error types for Hera core library.

use thiserror::Error;

/// Result type alias using Hera Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Hera operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Hostname has no registrable domain under the public suffix list
    #[error("Invalid hostname: {0}")]
    InvalidHostname(String),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
