//! Configuration for Hera.
//!
//! Resolution order:
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. Environment variables and CLI arguments (applied by the binary)

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Complete Hera configuration.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct HeraConfig {
    pub labels: LabelConfig,
    pub certificates: CertificateConfig,
    pub supervisor: SupervisorConfig,
    pub resolver: ResolverConfig,
    pub runtime: RuntimeConfig,
}

/// Names of the container labels Hera reads.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LabelConfig {
    /// Label holding the public hostname (required).
    pub hostname: String,
    /// Label holding the upstream port (required).
    pub port: String,
    /// Label naming an explicit certificate file (optional).
    pub certificate: String,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            hostname: "hera.hostname".to_string(),
            port: "hera.port".to_string(),
            certificate: "hera.certificate".to_string(),
        }
    }
}

/// Where origin certificates live and how they are matched.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CertificateConfig {
    /// Directory scanned (non-recursively) for certificate files.
    pub dir: PathBuf,
    /// File extension, without the leading dot.
    pub extension: String,
    /// Certificate file used when no root-domain match exists. `None` disables
    /// the fallback.
    pub fallback: Option<String>,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("/certs"),
            extension: "pem".to_string(),
            fallback: None,
        }
    }
}

/// Layout of the s6 service tree and the tunnel binary it launches.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Scan directory watched by `s6-svscan`.
    pub services_dir: PathBuf,
    /// Directory receiving one `<hostname>.log` per tunnel.
    pub log_dir: PathBuf,
    /// Tunnel binary invoked by the generated run script.
    pub tunnel_binary: String,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            services_dir: PathBuf::from("/var/run/s6/services"),
            log_dir: PathBuf::from("/var/log/hera"),
            tunnel_binary: "cloudflared".to_string(),
        }
    }
}

/// Retry policy for resolving a container's internal hostname.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResolverConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            retry_delay_ms: 2_000,
        }
    }
}

impl ResolverConfig {
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Which kind of runtime objects are watched.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Plain containers: `start` / `die` events.
    #[default]
    Standalone,
    /// Swarm services: `create` / `update` / `remove` events.
    Swarm,
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone => write!(f, "standalone"),
            Self::Swarm => write!(f, "swarm"),
        }
    }
}

/// Container runtime connection settings.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RuntimeConfig {
    pub mode: RuntimeMode,
    /// Docker socket path. `None` uses the client's local defaults.
    pub socket: Option<PathBuf>,
}

impl HeraConfig {
    /// Validate the configuration. Returns an error on invalid values.
    pub fn validate(&self) -> Result<()> {
        for (what, name) in [
            ("hostname label", &self.labels.hostname),
            ("port label", &self.labels.port),
            ("certificate label", &self.labels.certificate),
        ] {
            if name.trim().is_empty() {
                return Err(Error::Config(format!("{what} must not be empty")));
            }
        }
        if self.labels.hostname == self.labels.port {
            return Err(Error::Config(
                "hostname and port labels must differ".to_string(),
            ));
        }
        if self.certificates.extension.is_empty() || self.certificates.extension.contains('.') {
            return Err(Error::Config(format!(
                "certificate extension must be non-empty and contain no dot (got {:?})",
                self.certificates.extension
            )));
        }
        if self.resolver.max_attempts == 0 {
            return Err(Error::Config(
                "resolver.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.supervisor.tunnel_binary.trim().is_empty() {
            return Err(Error::Config(
                "supervisor.tunnel_binary must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load configuration from an optional TOML file on top of the defaults.
pub fn load_config(path: Option<&Path>) -> Result<HeraConfig> {
    let Some(path) = path else {
        return Ok(HeraConfig::default());
    };
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    let config: HeraConfig = toml::from_str(&content)?;
    Ok(config)
}
