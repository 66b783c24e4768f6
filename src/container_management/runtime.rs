//! The seam between the provisioning logic and a concrete container engine.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use tokio_util::sync::CancellationToken;

use crate::container_management::types::{ContainerSpec, ContainerSummary, PullProgress};
use crate::error_handling::types::{LogStreamError, RuntimeError};
use crate::log_streaming::types::LogFrame;

/// Progress messages of an in-flight image pull.
pub type PullStream = Pin<Box<dyn Stream<Item = Result<PullProgress, RuntimeError>> + Send>>;

/// Demultiplexed frames of a container's combined output, in wire order.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<LogFrame, LogStreamError>> + Send>>;

/// Operations the local adapter needs from a container engine.
///
/// Implementations hold no mutable state of their own and are shared behind
/// an `Arc` across concurrent callers. Containers are addressed by name or
/// id interchangeably, as the engine allows.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Lists image ids whose reference matches `reference` exactly.
    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError>;

    /// Starts pulling `reference`. `registry_token` is the opaque
    /// base64(JSON) credential token. The image is only guaranteed to be
    /// present once the returned stream is exhausted.
    fn pull_image(&self, reference: &str, registry_token: Option<&str>) -> PullStream;

    /// Returns the network id, or `NotFound`.
    async fn inspect_network(&self, name: &str) -> Result<String, RuntimeError>;

    async fn create_network(&self, name: &str) -> Result<(), RuntimeError>;

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError>;

    /// Lists all containers (running or not) whose name contains `name_filter`.
    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Creates (but does not start) a container named `spec.name`; returns its id.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError>;

    /// Extracts a tar `archive` into `dir` inside the container.
    async fn upload_archive(&self, container: &str, dir: &str, archive: Bytes) -> Result<(), RuntimeError>;

    async fn start_container(&self, container: &str) -> Result<(), RuntimeError>;

    async fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError>;

    /// Opens the combined stdout/stderr stream with timestamps enabled.
    fn container_logs(&self, container: &str, follow: bool) -> FrameStream;
}

/// Races `fut` against `cancel`, yielding `RuntimeError::Cancelled` as soon
/// as the token fires. The losing future is dropped.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, RuntimeError>
where
    F: Future<Output = Result<T, RuntimeError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
        res = fut => res,
    }
}
