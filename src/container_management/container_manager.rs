use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::container_management::container_query::ContainerQuery;
use crate::container_management::file_injector::ConfigFileInjector;
use crate::container_management::image_provisioner::ImageProvisioner;
use crate::container_management::network_provisioner::NetworkProvisioner;
use crate::container_management::runtime::{cancellable, ContainerRuntime};
use crate::container_management::types::{
    ContainerSpec, ContainerStats, ContainerSummary, DeployResult, RegistryAuth,
};
use crate::container_management::validation::{validate_container_name, validate_project_id};
use crate::error_handling::types::RuntimeError;

/// Drives local containers towards their desired [`ContainerSpec`].
///
/// Design notes:
/// - A container is never updated in place. If one with the same name
///   exists it is force-removed and recreated, whoever created it.
/// - Config files are injected after create and before start so the
///   entrypoint sees them at boot.
/// - Start and network attach are best-effort: their failures are logged and
///   reported in [`DeployResult`], leaving the container for inspection.
pub struct ContainerManager {
    runtime: Arc<dyn ContainerRuntime>,
    images: ImageProvisioner,
    networks: NetworkProvisioner,
    injector: ConfigFileInjector,
    query: ContainerQuery,
    stats: Mutex<ContainerStats>,
}

impl ContainerManager {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        info!("Initializing ContainerManager");
        Self {
            images: ImageProvisioner::new(Arc::clone(&runtime)),
            networks: NetworkProvisioner::new(Arc::clone(&runtime)),
            injector: ConfigFileInjector::new(Arc::clone(&runtime)),
            query: ContainerQuery::new(Arc::clone(&runtime)),
            runtime,
            stats: Mutex::new(ContainerStats::default()),
        }
    }

    /// Validates `spec`, provisions its image and the project network, then
    /// reconciles the container.
    ///
    /// Image and network provisioning failures abort the deploy.
    pub async fn deploy(
        &self,
        project_id: &str,
        spec: &ContainerSpec,
        auth: Option<&RegistryAuth>,
        cancel: &CancellationToken,
    ) -> Result<DeployResult, RuntimeError> {
        validate_project_id(project_id)?;
        spec.validate()?;

        info!("Deploying {} ({}) in project {}", spec.name, spec.image, project_id);

        self.images.ensure(&spec.image, auth, cancel).await?;
        let network = self.networks.ensure(project_id, cancel).await?;
        self.reconcile(spec, &network, cancel).await
    }

    /// Replaces any container named `spec.name` with a fresh one and starts it.
    ///
    /// An invalid `spec` is rejected before any runtime call. Errors from
    /// lookup, remove, create and file injection are returned; start and
    /// attach failures are downgraded to warnings.
    pub async fn reconcile(
        &self,
        spec: &ContainerSpec,
        network: &str,
        cancel: &CancellationToken,
    ) -> Result<DeployResult, RuntimeError> {
        spec.validate()?;

        let res = self.reconcile_container(spec, network, cancel).await;

        let mut stats = self.stats.lock().unwrap();
        match &res {
            Ok(result) => {
                stats.total_created += 1;
                if result.replaced {
                    stats.total_replaced += 1;
                }
                if !result.started {
                    stats.failed_starts += 1;
                }
            }
            Err(e) => {
                error!("Reconcile of container {} failed: {}", spec.name, e);
                stats.failed_count += 1;
            }
        }
        res
    }

    async fn reconcile_container(
        &self,
        spec: &ContainerSpec,
        network: &str,
        cancel: &CancellationToken,
    ) -> Result<DeployResult, RuntimeError> {
        let name = spec.name.as_str();

        let replaced = match self.query.find_by_name(name, cancel).await {
            Ok(id) => {
                info!("Removing existing container {} ({})", name, id);
                cancellable(cancel, self.runtime.remove_container(&id, true)).await?;
                true
            }
            Err(e) if e.is_not_found() => {
                debug!("No existing container {}", name);
                false
            }
            Err(e) => return Err(e),
        };

        let id = cancellable(cancel, self.runtime.create_container(spec)).await?;
        debug!("Created container {} ({})", name, id);

        self.injector.inject(name, &spec.files, cancel).await?;

        let started = match cancellable(cancel, self.runtime.start_container(name)).await {
            Ok(()) => true,
            Err(RuntimeError::Cancelled) => return Err(RuntimeError::Cancelled),
            Err(e) => {
                warn!("Error starting container {}: {}", name, e);
                false
            }
        };

        let network_attached =
            match cancellable(cancel, self.runtime.connect_network(network, name)).await {
                Ok(()) => true,
                Err(RuntimeError::Cancelled) => return Err(RuntimeError::Cancelled),
                Err(e) => {
                    warn!(
                        "Error adding container {} to network {}, it may not reach other project containers: {}",
                        name, network, e
                    );
                    false
                }
            };

        info!(
            "Container {} reconciled (replaced={}, started={}, network_attached={})",
            name, replaced, started, network_attached
        );
        Ok(DeployResult {
            name: name.to_string(),
            network: network.to_string(),
            replaced,
            started,
            network_attached,
        })
    }

    /// Containers whose name starts with `prefix`, e.g. all instances of a capsule.
    pub async fn instances(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.query.find_by_prefix(prefix, cancel).await
    }

    /// Force-removes every container whose name starts with `prefix` and
    /// returns how many were removed. Containers that vanish in between are
    /// skipped. The prefix must itself be a valid container name, so an empty
    /// prefix never matches every container on the host.
    pub async fn teardown(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, RuntimeError> {
        validate_container_name(prefix)?;

        let containers = self.query.find_by_prefix(prefix, cancel).await?;
        info!("Tearing down {} containers with prefix {}", containers.len(), prefix);

        let mut removed = 0;
        for container in containers {
            match cancellable(cancel, self.runtime.remove_container(&container.id, true)).await {
                Ok(()) => removed += 1,
                Err(e) if e.is_not_found() => {
                    debug!("Container {} already gone", container.id);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Returns a snapshot of the reconcile counters.
    pub fn get_container_stats(&self) -> ContainerStats {
        self.stats.lock().unwrap().clone()
    }
}
