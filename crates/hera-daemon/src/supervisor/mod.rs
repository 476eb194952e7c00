//! s6 service supervision for tunnel processes.
//!
//! Each tunnel owns one service directory `<services_dir>/<hostname>` holding a
//! generated `config.yml` and executable `run` script. `s6-svscan` creates a
//! `supervise/` subdirectory once it picks the service up; its presence is what
//! distinguishes [`ServiceState::Unregistered`] from the supervised states.

pub mod cmd;
pub mod error;
pub mod state;
pub mod templates;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use hera_core::config::SupervisorConfig;

use crate::certificate::Certificate;
use crate::tunnel::TunnelSpec;

pub use cmd::{CommandRunner, SystemCommandRunner};
pub use error::SupervisorError;
pub use state::{ServiceOp, ServiceState};

const SVC: &str = "s6-svc";
const SVSCANCTL: &str = "s6-svscanctl";
const SVSTAT: &str = "s6-svstat";
const SVWAIT: &str = "s6-svwait";

const CONFIG_FILE: &str = "config.yml";
const RUN_FILE: &str = "run";
const SUPERVISE_DIR: &str = "supervise";

/// Handle on the supervision directory of one public hostname.
#[derive(Clone)]
pub struct Service {
    hostname: String,
    config: SupervisorConfig,
    runner: Arc<dyn CommandRunner>,
}

impl std::fmt::Debug for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Service")
            .field("hostname", &self.hostname)
            .field("service_dir", &self.service_dir())
            .finish_non_exhaustive()
    }
}

impl Service {
    pub fn new(
        hostname: impl Into<String>,
        config: SupervisorConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            hostname: hostname.into(),
            config,
            runner,
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn service_dir(&self) -> PathBuf {
        self.config.services_dir.join(&self.hostname)
    }

    pub fn config_file_path(&self) -> PathBuf {
        self.service_dir().join(CONFIG_FILE)
    }

    pub fn run_file_path(&self) -> PathBuf {
        self.service_dir().join(RUN_FILE)
    }

    pub fn supervise_dir(&self) -> PathBuf {
        self.service_dir().join(SUPERVISE_DIR)
    }

    /// `<log_dir>/<hostname>.log`
    pub fn log_file_path(&self) -> PathBuf {
        self.config.log_dir.join(format!("{}.log", self.hostname))
    }

    /// Ensure the service directory exists. Never changes the state.
    pub async fn create(&self) -> Result<(), SupervisorError> {
        let dir = self.service_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SupervisorError::io(&dir, e))
    }

    /// (Re)write the configuration file and run script, replacing any
    /// previous content.
    pub async fn write_config(
        &self,
        spec: &TunnelSpec,
        certificate: &Certificate,
    ) -> Result<(), SupervisorError> {
        let config_path = self.config_file_path();
        let upstream = spec.upstream();
        let log_file = self.log_file_path();
        let config = templates::tunnel_config(&templates::TunnelFileValues {
            hostname: &spec.public_hostname,
            upstream: &upstream,
            log_file: &log_file,
            origin_cert: certificate.path(),
        });
        write_file(&config_path, &config, 0o644).await?;

        let run_path = self.run_file_path();
        let script = templates::run_script(&self.config.tunnel_binary, &config_path);
        write_file(&run_path, &script, 0o755).await?;

        debug!(
            hostname = %self.hostname,
            config = %config_path.display(),
            "Wrote tunnel service files"
        );
        Ok(())
    }

    /// Whether the scanner has picked up this service.
    pub async fn is_supervised(&self) -> Result<bool, SupervisorError> {
        let path = self.supervise_dir();
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SupervisorError::io(&path, e)),
        }
    }

    /// Whether the supervised process is currently up.
    pub async fn is_running(&self) -> Result<bool, SupervisorError> {
        let dir = self.service_dir_arg();
        let out = self.runner.run(SVSTAT, &["-u", &dir]).await?;
        Ok(out.contains("true"))
    }

    /// Discover the current state from the filesystem and the supervisor.
    pub async fn current_state(&self) -> Result<ServiceState, SupervisorError> {
        if !self.is_supervised().await? {
            return Ok(ServiceState::Unregistered);
        }
        if self.is_running().await? {
            Ok(ServiceState::SupervisedRunning)
        } else {
            Ok(ServiceState::SupervisedStopped)
        }
    }

    /// Ask the scanner to pick up the new service directory.
    pub async fn register(&self) -> Result<ServiceState, SupervisorError> {
        let from = self.current_state().await?;
        self.transition(from, ServiceOp::Register).await
    }

    pub async fn start(&self) -> Result<ServiceState, SupervisorError> {
        let from = self.current_state().await?;
        self.transition(from, ServiceOp::Start).await
    }

    /// Bring the process down; supervision stays in place.
    pub async fn stop(&self) -> Result<ServiceState, SupervisorError> {
        // s6-svc -d is idempotent, so only registration needs checking.
        let from = if self.is_supervised().await? {
            ServiceState::SupervisedRunning
        } else {
            ServiceState::Unregistered
        };
        self.transition(from, ServiceOp::Stop).await
    }

    /// Bring the process down, wait until it is down, then bring it up again.
    pub async fn restart(&self) -> Result<ServiceState, SupervisorError> {
        let from = self.current_state().await?;
        self.transition(from, ServiceOp::Restart).await
    }

    /// Apply `op` from a state the caller has already discovered.
    pub async fn transition(
        &self,
        from: ServiceState,
        op: ServiceOp,
    ) -> Result<ServiceState, SupervisorError> {
        let to = from.apply(op)?;
        let dir = self.service_dir_arg();

        match op {
            ServiceOp::Register => {
                let root = self.config.services_dir.to_string_lossy();
                self.runner.run(SVSCANCTL, &["-a", &root]).await?;
            }
            ServiceOp::Start => {
                self.runner.run(SVC, &["-u", &dir]).await?;
            }
            ServiceOp::Stop => {
                self.runner.run(SVC, &["-d", &dir]).await?;
            }
            ServiceOp::Restart => {
                // svwait only observes; the process must be told to go down.
                self.runner.run(SVC, &["-d", &dir]).await?;
                self.runner.run(SVWAIT, &["-d", &dir]).await?;
                self.runner.run(SVC, &["-u", &dir]).await?;
            }
        }

        debug!(hostname = %self.hostname, %op, %from, %to, "Service transition");
        Ok(to)
    }

    fn service_dir_arg(&self) -> String {
        self.service_dir().to_string_lossy().into_owned()
    }
}

async fn write_file(path: &Path, content: &str, mode: u32) -> Result<(), SupervisorError> {
    tokio::fs::write(path, content)
        .await
        .map_err(|e| SupervisorError::io(path, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(|e| SupervisorError::io(path, e))?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    Ok(())
}
