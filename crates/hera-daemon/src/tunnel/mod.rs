//! A tunnel: one public hostname served by one supervised tunnel process.

pub mod registry;

use std::net::IpAddr;

use tracing::info;

use crate::certificate::Certificate;
use crate::supervisor::{Service, ServiceOp, ServiceState, SupervisorError};

pub use registry::TunnelRegistry;

/// Connection facts for one tunnel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelSpec {
    /// Runtime id of the container being exposed.
    pub id: String,
    pub resolved_address: IpAddr,
    pub public_hostname: String,
    pub port: String,
}

impl TunnelSpec {
    /// Upstream origin as `address:port`, bracketing IPv6 addresses.
    pub fn upstream(&self) -> String {
        match self.resolved_address {
            IpAddr::V4(ip) => format!("{ip}:{}", self.port),
            IpAddr::V6(ip) => format!("[{ip}]:{}", self.port),
        }
    }
}

/// A provisionable tunnel.
#[derive(Debug)]
pub struct Tunnel {
    spec: TunnelSpec,
    certificate: Certificate,
    service: Service,
    state: ServiceState,
}

impl Tunnel {
    pub const fn new(spec: TunnelSpec, certificate: Certificate, service: Service) -> Self {
        Self {
            spec,
            certificate,
            service,
            state: ServiceState::Unregistered,
        }
    }

    pub const fn spec(&self) -> &TunnelSpec {
        &self.spec
    }

    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub const fn service(&self) -> &Service {
        &self.service
    }

    pub fn hostname(&self) -> &str {
        &self.spec.public_hostname
    }

    /// State after the last start or stop issued through this tunnel.
    pub const fn state(&self) -> ServiceState {
        self.state
    }

    /// Materialize the service files and bring the tunnel up.
    ///
    /// The supervision tool has no start-or-restart primitive and rejects a
    /// second registration, so the operation depends on the discovered state:
    /// register a new service, restart a running one, start a stopped one.
    pub async fn start(&mut self) -> Result<ServiceState, SupervisorError> {
        self.service.create().await?;
        self.service
            .write_config(&self.spec, &self.certificate)
            .await?;

        let current = self.service.current_state().await?;
        let op = match current {
            ServiceState::Unregistered => {
                info!(hostname = %self.hostname(), "Registering tunnel");
                ServiceOp::Register
            }
            ServiceState::SupervisedRunning => {
                info!(hostname = %self.hostname(), "Restarting tunnel");
                ServiceOp::Restart
            }
            ServiceState::SupervisedStopped => {
                info!(hostname = %self.hostname(), "Starting tunnel");
                ServiceOp::Start
            }
        };

        self.state = self.service.transition(current, op).await?;
        Ok(self.state)
    }

    /// Bring the tunnel process down, leaving it supervised.
    pub async fn stop(&mut self) -> Result<ServiceState, SupervisorError> {
        info!(hostname = %self.hostname(), "Stopping tunnel");
        self.state = self.service.stop().await?;
        Ok(self.state)
    }
}
