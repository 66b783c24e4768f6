//! [`ContainerRuntime`] backed by the Docker Engine API.

use std::collections::HashMap;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, UploadToContainerOptions,
};
use bollard::image::{CreateImageOptions, ListImagesOptions};
use bollard::models::{EndpointSettings, HostConfig, PortBinding};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use log::{debug, info};

use crate::configuration::types::RuntimeSettings;
use crate::container_management::image_provisioner::decode_registry_token;
use crate::container_management::runtime::{ContainerRuntime, FrameStream, PullStream};
use crate::container_management::types::{ContainerSpec, ContainerSummary, PullProgress};
use crate::error_handling::types::{LogStreamError, RuntimeError};
use crate::log_streaming::types::{LogFrame, LogOrigin};

/// Thin adapter over a [`Docker`] client. The client is a cheap handle to a
/// pooled connection and is safe to share.
#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connects to `settings.host`, or the local default socket when unset,
    /// and negotiates the API version with the daemon.
    pub async fn connect(settings: &RuntimeSettings) -> Result<Self, RuntimeError> {
        let docker = match settings.host.as_deref() {
            None => Docker::connect_with_local_defaults()?,
            Some(host) if host.starts_with("unix://") => {
                Docker::connect_with_unix(host, settings.timeout_secs, API_DEFAULT_VERSION)?
            }
            Some(host) => {
                Docker::connect_with_http(host, settings.timeout_secs, API_DEFAULT_VERSION)?
            }
        };
        let docker = docker.negotiate_version().await?;
        info!(
            "Connected to container runtime at {}",
            settings.host.as_deref().unwrap_or("local default socket")
        );
        Ok(Self { docker })
    }

    pub fn from_client(docker: Docker) -> Self {
        Self { docker }
    }
}

/// Splits an image reference into repository and tag or digest. A reference
/// with neither resolves to `latest`, otherwise the engine pulls every tag.
pub fn split_image_reference(reference: &str) -> (&str, &str) {
    let (name, digest) = match reference.split_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (reference, None),
    };
    // A ':' before the last '/' is a registry port, not a tag.
    let name_start = name.rfind('/').map_or(0, |i| i + 1);
    let (repository, tag) = match name[name_start..].rfind(':') {
        Some(i) => (&name[..name_start + i], Some(&name[name_start + i + 1..])),
        None => (name, None),
    };
    (repository, digest.or(tag).unwrap_or("latest"))
}

fn pull_options(reference: &str) -> CreateImageOptions<String> {
    let (repository, tag) = split_image_reference(reference);
    CreateImageOptions {
        from_image: repository.to_string(),
        tag: tag.to_string(),
        ..Default::default()
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let env = spec
        .env
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>();

    let mut exposed_ports = HashMap::new();
    let mut port_bindings = HashMap::new();
    for port in &spec.ports {
        let key = format!("{}/{}", port.container_port, port.protocol);
        exposed_ports.insert(key.clone(), HashMap::new());
        port_bindings.insert(
            key,
            Some(vec![PortBinding {
                host_ip: None,
                host_port: port.host_port.map(|p| p.to_string()),
            }]),
        );
    }

    let binds = spec
        .mounts
        .iter()
        .map(|m| {
            if m.read_only {
                format!("{}:{}:ro", m.source, m.target)
            } else {
                format!("{}:{}", m.source, m.target)
            }
        })
        .collect::<Vec<_>>();

    Config {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        env: Some(env),
        labels: Some(spec.labels.clone().into_iter().collect()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            port_bindings: Some(port_bindings),
            binds: Some(binds),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn frame_from_output(output: LogOutput) -> LogFrame {
    match output {
        LogOutput::StdErr { message } => LogFrame {
            origin: LogOrigin::Stderr,
            payload: message,
        },
        LogOutput::StdOut { message }
        | LogOutput::StdIn { message }
        | LogOutput::Console { message } => LogFrame {
            origin: LogOrigin::Stdout,
            payload: message,
        },
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("reference".to_string(), vec![reference.to_string()]);
        let images = self
            .docker
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(images.into_iter().map(|i| i.id).collect())
    }

    fn pull_image(&self, reference: &str, registry_token: Option<&str>) -> PullStream {
        let credentials = match registry_token.map(decode_registry_token).transpose() {
            Ok(credential) => credential.map(|c| DockerCredentials {
                serveraddress: Some(c.serveraddress),
                username: Some(c.username),
                password: Some(c.password),
                auth: Some(c.auth),
                ..Default::default()
            }),
            Err(e) => return Box::pin(stream::once(async move { Err(e) })),
        };

        debug!("Requesting pull of {}", reference);
        let progress = self
            .docker
            .create_image(
                Some(pull_options(reference)),
                None,
                credentials,
            )
            .map(|item| {
                item.map(|info| PullProgress {
                    id: info.id,
                    status: info.status,
                })
                .map_err(RuntimeError::from)
            });
        Box::pin(progress)
    }

    async fn inspect_network(&self, name: &str) -> Result<String, RuntimeError> {
        let network = self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await?;
        Ok(network.id.unwrap_or_default())
    }

    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.docker
            .create_network(CreateNetworkOptions {
                name: name.to_string(),
                check_duplicate: true,
                ..Default::default()
            })
            .await?;
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        self.docker
            .connect_network(
                network,
                ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config: EndpointSettings::default(),
                },
            )
            .await?;
        Ok(())
    }

    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let mut filters = HashMap::new();
        filters.insert("name".to_string(), vec![name_filter.to_string()]);
        let containers = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(containers
            .into_iter()
            .map(|c| ContainerSummary {
                id: c.id.unwrap_or_default(),
                names: c.names.unwrap_or_default(),
                image: c.image.unwrap_or_default(),
                state: c.state.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        let response = self
            .docker
            .create_container(
                Some(CreateContainerOptions {
                    name: spec.name.clone(),
                    platform: None,
                }),
                container_config(spec),
            )
            .await?;
        for warning in &response.warnings {
            debug!("create {}: {}", spec.name, warning);
        }
        Ok(response.id)
    }

    async fn upload_archive(&self, container: &str, dir: &str, archive: Bytes) -> Result<(), RuntimeError> {
        self.docker
            .upload_to_container(
                container,
                Some(UploadToContainerOptions {
                    path: dir.to_string(),
                    ..Default::default()
                }),
                archive,
            )
            .await?;
        Ok(())
    }

    async fn start_container(&self, container: &str) -> Result<(), RuntimeError> {
        self.docker
            .start_container(container, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                container,
                Some(RemoveContainerOptions {
                    force,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    fn container_logs(&self, container: &str, follow: bool) -> FrameStream {
        let frames = self
            .docker
            .logs(
                container,
                Some(LogsOptions::<String> {
                    follow,
                    stdout: true,
                    stderr: true,
                    timestamps: true,
                    ..Default::default()
                }),
            )
            .map(|item| {
                item.map(frame_from_output)
                    .map_err(|e| LogStreamError::from(RuntimeError::from(e)))
            });
        Box::pin(frames)
    }
}
