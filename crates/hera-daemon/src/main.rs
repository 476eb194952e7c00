//! Hera daemon
//!
//! Exposes labelled containers through supervised tunnels.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use hera_core::config::{HeraConfig, RuntimeMode, load_config};
use hera_daemon::TunnelController;
use hera_daemon::certificate::missing_certificate_help;
use hera_daemon::resolver::DnsResolver;
use hera_daemon::runtime::DockerRuntime;
use hera_daemon::supervisor::SystemCommandRunner;

#[derive(Parser, Debug)]
#[command(name = "hera")]
#[command(version, about = "Hera - tunnels for labelled containers")]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "HERA_CONFIG")]
    config: Option<PathBuf>,

    /// Watch swarm services instead of standalone containers
    #[arg(long, env = "HERA_SWARM")]
    swarm: bool,

    /// Label holding the public hostname
    #[arg(long, env = "HERA_HOST_LABEL")]
    hostname_label: Option<String>,

    /// Label holding the upstream port
    #[arg(long, env = "HERA_PORT_LABEL")]
    port_label: Option<String>,

    /// Label naming an explicit certificate file
    #[arg(long, env = "HERA_CERTIFICATE_LABEL")]
    certificate_label: Option<String>,

    /// Directory holding origin certificates
    #[arg(long, env = "HERA_CERTS_DIR")]
    certs_dir: Option<PathBuf>,

    /// Certificate file used when no root-domain match exists (e.g. "cert.pem")
    #[arg(long, env = "HERA_DEFAULT_CERTIFICATE")]
    default_certificate: Option<String>,

    /// s6 services root
    #[arg(long, env = "HERA_SERVICES_DIR")]
    services_dir: Option<PathBuf>,

    /// Directory for the daemon log and per-tunnel log files
    #[arg(long, env = "HERA_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Docker engine socket path
    #[arg(long, env = "DOCKER_SOCKET")]
    docker_socket: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "warn").
    #[arg(long, default_value = "info", env = "HERA_LOG_LEVEL")]
    log_level: String,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long, env = "HERA_LOG_JSON")]
    log_json: bool,
}

impl Args {
    /// Layer command-line values over the file configuration.
    fn apply(self, config: &mut HeraConfig) {
        if self.swarm {
            config.runtime.mode = RuntimeMode::Swarm;
        }
        if let Some(v) = self.hostname_label {
            config.labels.hostname = v;
        }
        if let Some(v) = self.port_label {
            config.labels.port = v;
        }
        if let Some(v) = self.certificate_label {
            config.labels.certificate = v;
        }
        if let Some(v) = self.certs_dir {
            config.certificates.dir = v;
        }
        if let Some(v) = self.default_certificate {
            config.certificates.fallback = Some(v);
        }
        if let Some(v) = self.services_dir {
            config.supervisor.services_dir = v;
        }
        if let Some(v) = self.log_dir {
            config.supervisor.log_dir = v;
        }
        if let Some(v) = self.docker_socket {
            config.runtime.socket = Some(v);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log_filter = format!(
        "hera_daemon={level},hera_core={level}",
        level = args.log_level
    );
    let log_json = args.log_json;

    let mut config = load_config(args.config.as_deref())?;
    args.apply(&mut config);
    config.validate()?;

    // Hold the guard so buffered lines reach the daemon log file on exit.
    let _log_guard = hera_core::tracing_init::init_tracing(
        &log_filter,
        log_json,
        Some(&config.supervisor.log_dir),
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = %config.runtime.mode,
        certs = %config.certificates.dir.display(),
        services = %config.supervisor.services_dir.display(),
        "Starting hera"
    );

    let runtime = DockerRuntime::connect(config.runtime.socket.as_deref(), config.runtime.mode)
        .await?;

    let mut controller = TunnelController::new(
        &config,
        Arc::new(runtime),
        Arc::new(DnsResolver),
        Arc::new(SystemCommandRunner),
    );

    if let Err(e) = controller.certificates().verify() {
        warn!(error = %e, "{}", missing_certificate_help(controller.certificates().dir()));
    }

    let events = controller.subscribe();
    let revived = controller.revive().await?;
    info!(tunnels = revived, "Revive complete");

    #[cfg(unix)]
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    #[cfg(unix)]
    let sigterm_future = sigterm.recv();
    #[cfg(not(unix))]
    let sigterm_future = std::future::pending::<Option<()>>();

    tokio::select! {
        e = controller.listen(events) => {
            error!(error = %e, "Stopped listening for container events");
            return Err(e.into());
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C shutdown signal");
        }
        _ = sigterm_future => {
            info!("Received SIGTERM shutdown signal");
        }
    }

    info!("Hera stopped");
    Ok(())
}
