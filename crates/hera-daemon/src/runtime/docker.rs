//! Docker Engine client.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::service::{InspectServiceOptions, ListServicesOptions};
use bollard::system::EventsOptions;
use bollard::{API_DEFAULT_VERSION, Docker};
use tokio_stream::StreamExt;
use tracing::debug;

use hera_core::ContainerDescriptor;
use hera_core::config::RuntimeMode;

use super::{ContainerRuntime, EventKind, EventStream, RuntimeError, RuntimeEvent};

/// Request timeout for the engine socket, in seconds.
const SOCKET_TIMEOUT_SECS: u64 = 120;

/// [`ContainerRuntime`] backed by the Docker Engine API.
///
/// In standalone mode this tracks containers; in swarm mode it tracks
/// services and uses the service name as the internal hostname.
#[derive(Debug, Clone)]
pub struct DockerRuntime {
    docker: Docker,
    mode: RuntimeMode,
}

impl DockerRuntime {
    /// Connect to the engine and check that it answers.
    ///
    /// Without an explicit socket the client honours `DOCKER_HOST` and falls
    /// back to the platform default.
    pub async fn connect(socket: Option<&Path>, mode: RuntimeMode) -> Result<Self, RuntimeError> {
        let docker = match socket {
            Some(path) => Docker::connect_with_socket(
                &path.to_string_lossy(),
                SOCKET_TIMEOUT_SECS,
                API_DEFAULT_VERSION,
            ),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| RuntimeError::Connect(e.to_string()))?;

        let version = docker
            .version()
            .await
            .map_err(|e| RuntimeError::Connect(e.to_string()))?;
        debug!(
            version = version.version.as_deref().unwrap_or("unknown"),
            api = version.api_version.as_deref().unwrap_or("unknown"),
            "Connected to Docker"
        );

        Ok(Self { docker, mode })
    }

    fn event_filters(mode: RuntimeMode) -> HashMap<String, Vec<String>> {
        let (typ, actions): (&str, &[&str]) = match mode {
            RuntimeMode::Standalone => ("container", &["start", "die"]),
            RuntimeMode::Swarm => ("service", &["create", "update", "remove"]),
        };
        HashMap::from([
            ("type".to_string(), vec![typ.to_string()]),
            (
                "event".to_string(),
                actions.iter().map(|a| (*a).to_string()).collect(),
            ),
        ])
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerDescriptor, RuntimeError> {
        let info = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| inspect_err(id, &e))?;

        let config = info.config.unwrap_or_default();
        Ok(ContainerDescriptor::new(
            info.id.unwrap_or_else(|| id.to_string()),
            config.hostname.unwrap_or_default(),
            config.labels.unwrap_or_default(),
        ))
    }

    async fn inspect_service(&self, id: &str) -> Result<ContainerDescriptor, RuntimeError> {
        let info = self
            .docker
            .inspect_service(id, None::<InspectServiceOptions>)
            .await
            .map_err(|e| inspect_err(id, &e))?;

        let spec = info.spec.unwrap_or_default();
        Ok(ContainerDescriptor::new(
            info.id.unwrap_or_else(|| id.to_string()),
            spec.name.unwrap_or_default(),
            spec.labels.unwrap_or_default(),
        ))
    }
}

fn inspect_err(id: &str, e: &bollard::errors::Error) -> RuntimeError {
    RuntimeError::Inspect {
        id: id.to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    fn events(&self) -> EventStream {
        let mode = self.mode;
        let options = EventsOptions::<String> {
            filters: Self::event_filters(mode),
            ..Default::default()
        };

        let stream = self
            .docker
            .events(Some(options))
            .filter_map(move |item| match item {
                Ok(message) => {
                    let action = message.action?;
                    let id = message.actor.and_then(|actor| actor.id)?;
                    let kind = EventKind::classify(mode, &action);
                    Some(Ok(RuntimeEvent::new(kind, action, id)))
                }
                Err(e) => Some(Err(RuntimeError::Events(e.to_string()))),
            });
        Box::pin(stream)
    }

    async fn list_running(&self) -> Result<Vec<String>, RuntimeError> {
        let list_err = |e: bollard::errors::Error| RuntimeError::List(e.to_string());

        match self.mode {
            RuntimeMode::Standalone => {
                let options = ListContainersOptions::<String> {
                    filters: HashMap::from([(
                        "status".to_string(),
                        vec!["running".to_string()],
                    )]),
                    ..Default::default()
                };
                let containers = self
                    .docker
                    .list_containers(Some(options))
                    .await
                    .map_err(list_err)?;
                Ok(containers.into_iter().filter_map(|c| c.id).collect())
            }
            RuntimeMode::Swarm => {
                let services = self
                    .docker
                    .list_services(None::<ListServicesOptions<String>>)
                    .await
                    .map_err(list_err)?;
                Ok(services.into_iter().filter_map(|s| s.id).collect())
            }
        }
    }

    async fn inspect(&self, id: &str) -> Result<ContainerDescriptor, RuntimeError> {
        match self.mode {
            RuntimeMode::Standalone => self.inspect_container(id).await,
            RuntimeMode::Swarm => self.inspect_service(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standalone_filters_container_start_and_die() {
        let filters = DockerRuntime::event_filters(RuntimeMode::Standalone);
        assert_eq!(filters["type"], vec!["container"]);
        assert_eq!(filters["event"], vec!["start", "die"]);
    }

    #[test]
    fn swarm_filters_service_changes() {
        let filters = DockerRuntime::event_filters(RuntimeMode::Swarm);
        assert_eq!(filters["type"], vec!["service"]);
        assert_eq!(filters["event"], vec!["create", "update", "remove"]);
    }
}
