use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use crate::container_management::runtime::{cancellable, ContainerRuntime};
use crate::error_handling::types::RuntimeError;

/// Ensures the per-project network exists. The network name is the project
/// id; every container of the project shares it.
///
/// Inspect-then-create is not atomic. Two callers provisioning the same
/// project can both see `NotFound`; the loser's create conflict is treated
/// as success, so the race is harmless for a single-host dev setup.
pub struct NetworkProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
}

impl NetworkProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Returns the network name for `project_id`, creating it on first use.
    pub async fn ensure(
        &self,
        project_id: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RuntimeError> {
        match cancellable(cancel, self.runtime.inspect_network(project_id)).await {
            Ok(id) => {
                debug!("Network {} already exists ({})", project_id, id);
            }
            Err(e) if e.is_not_found() => {
                info!("Creating network {}", project_id);
                match cancellable(cancel, self.runtime.create_network(project_id)).await {
                    Ok(()) => {}
                    Err(e) if e.is_already_exists() => {
                        debug!("Network {} was created concurrently", project_id);
                    }
                    Err(e) => return Err(e),
                }
            }
            Err(e) => return Err(e),
        }
        Ok(project_id.to_string())
    }
}
