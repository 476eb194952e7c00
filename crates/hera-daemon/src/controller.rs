//! The tunnel controller: turns runtime events into tunnel operations.
//!
//! Events are handled strictly one at a time, each to completion, which is
//! what keeps supervision commands for one hostname from overlapping. The
//! controller owns the [`TunnelRegistry`] outright; nothing else writes it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, warn};

use hera_core::HeraConfig;
use hera_core::config::{LabelConfig, SupervisorConfig};
use hera_core::container::short_id;

use crate::certificate::{CertificateError, CertificateStore};
use crate::resolver::{self, HostResolver, ResolveError, RetryPolicy};
use crate::runtime::{ContainerRuntime, EventKind, EventStream, RuntimeError, RuntimeEvent};
use crate::supervisor::{CommandRunner, Service, ServiceState, SupervisorError};
use crate::tunnel::{Tunnel, TunnelRegistry, TunnelSpec};

/// Per-container failures. Logged and survived.
#[derive(Debug, thiserror::Error)]
pub enum TunnelError {
    #[error(transparent)]
    Inspect(#[from] RuntimeError),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    #[error("Supervision of {hostname} failed: {source}")]
    Supervision {
        hostname: String,
        #[source]
        source: SupervisorError,
    },

    #[error("Invalid public hostname {0:?}")]
    InvalidHostname(String),
}

/// Failures that end the controller.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Event stream failed: {0}")]
    Stream(#[source] RuntimeError),

    #[error("Event stream closed by the runtime")]
    StreamClosed,

    #[error("Unable to list running workloads: {0}")]
    List(#[source] RuntimeError),
}

/// Why a container was passed over without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The hostname or port label is absent.
    MissingLabels,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started {
        hostname: String,
        state: ServiceState,
    },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped { hostname: String },
    NotRegistered,
}

pub struct TunnelController {
    labels: LabelConfig,
    supervisor: SupervisorConfig,
    retry: RetryPolicy,
    certificates: CertificateStore,
    runtime: Arc<dyn ContainerRuntime>,
    resolver: Arc<dyn HostResolver>,
    runner: Arc<dyn CommandRunner>,
    registry: TunnelRegistry,
}

impl std::fmt::Debug for TunnelController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TunnelController")
            .field("labels", &self.labels)
            .field("retry", &self.retry)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl TunnelController {
    pub fn new(
        config: &HeraConfig,
        runtime: Arc<dyn ContainerRuntime>,
        resolver: Arc<dyn HostResolver>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            labels: config.labels.clone(),
            supervisor: config.supervisor.clone(),
            retry: RetryPolicy::from(&config.resolver),
            certificates: CertificateStore::new(config.certificates.clone()),
            runtime,
            resolver,
            runner,
            registry: TunnelRegistry::new(),
        }
    }

    pub const fn registry(&self) -> &TunnelRegistry {
        &self.registry
    }

    pub const fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    /// Provision the tunnel for container `id`.
    ///
    /// Containers without the required labels are skipped before any
    /// resolution, certificate lookup or supervision work. On any failure the
    /// registry is left as it was. If the container already had a tunnel under
    /// another public hostname, that tunnel is stopped once the new one is up.
    pub async fn handle_start(&mut self, id: &str) -> Result<StartOutcome, TunnelError> {
        let container = self.runtime.inspect(id).await?;
        let Some(labels) = container.tunnel_labels(&self.labels) else {
            return Ok(StartOutcome::Skipped(SkipReason::MissingLabels));
        };
        validate_public_hostname(&labels.hostname)?;

        let address = resolver::resolve(
            self.resolver.as_ref(),
            &container.internal_hostname,
            self.retry,
        )
        .await?;
        let certificate = self
            .certificates
            .find_for_hostname(&labels.hostname, labels.certificate.as_deref())?;

        let spec = TunnelSpec {
            id: container.id.clone(),
            resolved_address: address,
            public_hostname: labels.hostname.clone(),
            port: labels.port,
        };
        let service = Service::new(
            labels.hostname.as_str(),
            self.supervisor.clone(),
            Arc::clone(&self.runner),
        );
        let mut tunnel = Tunnel::new(spec, certificate, service);

        let state = tunnel
            .start()
            .await
            .map_err(|source| TunnelError::Supervision {
                hostname: labels.hostname.clone(),
                source,
            })?;

        if let Some(previous) = self.registry.get_mut(&container.id)
            && previous.hostname() != labels.hostname
        {
            info!(
                container = %container.short_id(),
                old = %previous.hostname(),
                new = %labels.hostname,
                "Public hostname changed, stopping previous tunnel"
            );
            if let Err(e) = previous.stop().await {
                error!(
                    container = %container.short_id(),
                    hostname = %previous.hostname(),
                    error = %e,
                    "Unable to stop previous tunnel"
                );
            }
        }

        for evicted in self.registry.insert(container.id.as_str(), tunnel) {
            info!(
                container = %short_id(&evicted),
                hostname = %labels.hostname,
                "Hostname taken over by another container"
            );
        }

        Ok(StartOutcome::Started {
            hostname: labels.hostname,
            state,
        })
    }

    /// Tear down the tunnel registered for container `id`, if any.
    ///
    /// Works from the bare id so it still applies when the container is
    /// already gone. The entry is kept if the stop command fails.
    pub async fn handle_stop(&mut self, id: &str) -> Result<StopOutcome, TunnelError> {
        let Some(tunnel) = self.registry.get_mut(id) else {
            return Ok(StopOutcome::NotRegistered);
        };
        let hostname = tunnel.hostname().to_string();

        tunnel
            .stop()
            .await
            .map_err(|source| TunnelError::Supervision {
                hostname: hostname.clone(),
                source,
            })?;
        self.registry.remove(id);

        Ok(StopOutcome::Stopped { hostname })
    }

    /// Dispatch one event and log its outcome. Never fails.
    pub async fn handle_event(&mut self, event: &RuntimeEvent) {
        let container = short_id(&event.id);
        let action = event.action.as_str();
        match event.kind {
            EventKind::Start => match self.handle_start(&event.id).await {
                Ok(StartOutcome::Started { hostname, state }) => {
                    info!(%container, %action, %hostname, %state, "Tunnel started");
                }
                Ok(StartOutcome::Skipped(reason)) => {
                    info!(%container, %action, ?reason, "Ignoring container");
                }
                Err(e) => error!(%container, %action, error = %e, "Unable to start tunnel"),
            },
            EventKind::Stop => match self.handle_stop(&event.id).await {
                Ok(StopOutcome::Stopped { hostname }) => {
                    info!(%container, %action, %hostname, "Tunnel stopped");
                }
                Ok(StopOutcome::NotRegistered) => {
                    debug!(%container, %action, "No tunnel registered");
                }
                Err(e) => error!(%container, %action, error = %e, "Unable to stop tunnel"),
            },
            EventKind::Ignored => debug!(%container, %action, "Ignoring event"),
        }
    }

    /// Rebuild tunnels for everything already running.
    ///
    /// Replays the start path for each running workload; per-container
    /// failures are logged. Only a failed listing is an error.
    pub async fn revive(&mut self) -> Result<usize, ControllerError> {
        let ids = self
            .runtime
            .list_running()
            .await
            .map_err(ControllerError::List)?;
        info!(count = ids.len(), "Reviving tunnels for running containers");

        for id in &ids {
            let event = RuntimeEvent::new(EventKind::Start, "revive", id.as_str());
            self.handle_event(&event).await;
        }
        Ok(self.registry.len())
    }

    /// Open the runtime event stream and start draining it into a buffer.
    ///
    /// Call before [`Self::revive`] so that events emitted while reviving are
    /// queued for [`Self::listen`] instead of lost. The buffer ends after the
    /// first error item.
    pub fn subscribe(&self) -> EventStream {
        let mut source = self.runtime.events();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(item) = source.next().await {
                let failed = item.is_err();
                if tx.send(item).is_err() || failed {
                    break;
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    /// Consume `events` until the stream fails or closes.
    ///
    /// Returns the reason listening ended; there is no clean exit.
    pub async fn listen(&mut self, mut events: EventStream) -> ControllerError {
        info!("Listening for container events");

        loop {
            match events.next().await {
                Some(Ok(event)) => self.handle_event(&event).await,
                Some(Err(e)) => {
                    warn!(error = %e, "Runtime event stream failed");
                    return ControllerError::Stream(e);
                }
                None => return ControllerError::StreamClosed,
            }
        }
    }
}

/// The public hostname names a directory under the services root.
fn validate_public_hostname(hostname: &str) -> Result<(), TunnelError> {
    let valid = !hostname.is_empty()
        && !hostname.contains(['/', '\\'])
        && !hostname.contains("..")
        && !hostname.starts_with('.');
    if valid {
        Ok(())
    } else {
        Err(TunnelError::InvalidHostname(hostname.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_hostname_must_be_a_single_path_component() {
        assert!(validate_public_hostname("site.tld").is_ok());
        assert!(validate_public_hostname("a.b.site.tld").is_ok());

        for bad in ["", "../etc", "site/tld", ".hidden", "a..b", "a\\b"] {
            assert!(
                matches!(
                    validate_public_hostname(bad),
                    Err(TunnelError::InvalidHostname(_))
                ),
                "{bad:?} should be rejected"
            );
        }
    }
}
