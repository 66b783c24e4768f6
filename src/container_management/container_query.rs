use std::sync::Arc;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::container_management::runtime::{cancellable, ContainerRuntime};
use crate::container_management::types::ContainerSummary;
use crate::error_handling::types::RuntimeError;

/// Name-based container lookups. The runtime's name filter matches
/// substrings, so results are narrowed here.
pub struct ContainerQuery {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerQuery {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Id of the container named exactly `name`, or `NotFound`.
    pub async fn find_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        debug!("Looking up container {}", name);
        let containers = cancellable(cancel, self.runtime.list_containers(name)).await?;
        containers
            .into_iter()
            .find(|c| c.has_name(name))
            .map(|c| c.id)
            .ok_or_else(|| RuntimeError::NotFound(format!("container '{}' not found", name)))
    }

    /// All containers whose name starts with `prefix`; empty is not an error.
    pub async fn find_by_prefix(
        &self,
        prefix: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        debug!("Looking up containers with prefix {}", prefix);
        let containers = cancellable(cancel, self.runtime.list_containers(prefix)).await?;
        Ok(containers
            .into_iter()
            .filter(|c| c.has_name_prefix(prefix))
            .collect())
    }
}
