//! In-memory runtime that records every call, for tests that must not touch
//! a real container engine.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use crate::container_management::runtime::{ContainerRuntime, FrameStream, PullStream};
use crate::container_management::types::{ContainerSpec, ContainerSummary, PullProgress};
use crate::error_handling::types::RuntimeError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListImages(String),
    PullImage {
        reference: String,
        token: Option<String>,
    },
    InspectNetwork(String),
    CreateNetwork(String),
    ConnectNetwork {
        network: String,
        container: String,
    },
    ListContainers(String),
    CreateContainer(String),
    UploadArchive {
        container: String,
        dir: String,
        archive: Bytes,
    },
    StartContainer(String),
    RemoveContainer {
        container: String,
        force: bool,
    },
    ContainerLogs {
        container: String,
        follow: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    ListImages,
    PullImage,
    InspectNetwork,
    CreateNetwork,
    ConnectNetwork,
    ListContainers,
    CreateContainer,
    UploadArchive,
    StartContainer,
    RemoveContainer,
}

#[derive(Default)]
pub struct MockRuntime {
    calls: Mutex<Vec<Call>>,
    containers: Mutex<Vec<ContainerSummary>>,
    images: Mutex<Vec<String>>,
    networks: Mutex<Vec<String>>,
    failing: Mutex<HashSet<Op>>,
    hanging: Mutex<HashSet<Op>>,
    conflict_on_network_create: Mutex<bool>,
    log_streams: Mutex<VecDeque<FrameStream>>,
    pull_steps: Mutex<Option<usize>>,
    pull_consumed: Arc<AtomicUsize>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_container(self, name: &str) -> Self {
        self.containers.lock().unwrap().push(ContainerSummary {
            id: format!("id-{}", name),
            names: vec![format!("/{}", name)],
            image: "busybox".to_string(),
            state: "running".to_string(),
        });
        self
    }

    pub fn with_image(self, reference: &str) -> Self {
        self.images.lock().unwrap().push(reference.to_string());
        self
    }

    pub fn with_network(self, name: &str) -> Self {
        self.networks.lock().unwrap().push(name.to_string());
        self
    }

    pub fn failing_on(self, op: Op) -> Self {
        self.failing.lock().unwrap().insert(op);
        self
    }

    pub fn hanging_on(self, op: Op) -> Self {
        self.hanging.lock().unwrap().insert(op);
        self
    }

    /// Makes `create_network` report a conflict, as if another caller won
    /// the race between inspect and create.
    pub fn conflicting_network_create(self) -> Self {
        *self.conflict_on_network_create.lock().unwrap() = true;
        self
    }

    /// Number of progress messages each pull yields (default 2).
    pub fn with_pull_progress(self, steps: usize) -> Self {
        *self.pull_steps.lock().unwrap() = Some(steps);
        self
    }

    /// Progress messages the caller actually polled out of pull streams.
    pub fn pull_progress_consumed(&self) -> usize {
        self.pull_consumed.load(Ordering::SeqCst)
    }

    pub fn push_logs(&self, frames: FrameStream) {
        self.log_streams.lock().unwrap().push_back(frames);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| pred(c)).count()
    }

    pub fn position(&self, pred: impl Fn(&Call) -> bool) -> Option<usize> {
        self.calls().iter().position(pred)
    }

    pub fn container_names(&self) -> Vec<String> {
        self.containers
            .lock()
            .unwrap()
            .iter()
            .flat_map(|c| c.names.clone())
            .collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.networks.lock().unwrap().iter().any(|n| n == name)
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    async fn gate(&self, op: Op) -> Result<(), RuntimeError> {
        let hangs = self.hanging.lock().unwrap().contains(&op);
        if hangs {
            std::future::pending::<()>().await;
        }
        let fails = self.failing.lock().unwrap().contains(&op);
        if fails {
            return Err(RuntimeError::Unavailable(format!("{:?} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for MockRuntime {
    async fn list_images(&self, reference: &str) -> Result<Vec<String>, RuntimeError> {
        self.record(Call::ListImages(reference.to_string()));
        self.gate(Op::ListImages).await?;
        Ok(self
            .images
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.as_str() == reference)
            .map(|i| format!("sha256:{}", i))
            .collect())
    }

    fn pull_image(&self, reference: &str, registry_token: Option<&str>) -> PullStream {
        self.record(Call::PullImage {
            reference: reference.to_string(),
            token: registry_token.map(str::to_string),
        });
        if self.hanging.lock().unwrap().contains(&Op::PullImage) {
            return Box::pin(stream::pending());
        }
        if self.failing.lock().unwrap().contains(&Op::PullImage) {
            return Box::pin(stream::once(async {
                Err(RuntimeError::Unavailable("pull access denied".to_string()))
            }));
        }
        self.images.lock().unwrap().push(reference.to_string());
        let steps = self.pull_steps.lock().unwrap().unwrap_or(2);
        let consumed = Arc::clone(&self.pull_consumed);
        let progress = stream::iter(0..steps).map(move |step| {
            consumed.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RuntimeError>(PullProgress {
                id: Some(format!("layer-{}", step)),
                status: Some("Downloading".to_string()),
            })
        });
        Box::pin(progress)
    }

    async fn inspect_network(&self, name: &str) -> Result<String, RuntimeError> {
        self.record(Call::InspectNetwork(name.to_string()));
        self.gate(Op::InspectNetwork).await?;
        if self.has_network(name) {
            Ok(format!("net-{}", name))
        } else {
            Err(RuntimeError::NotFound(format!("network {} not found", name)))
        }
    }

    async fn create_network(&self, name: &str) -> Result<(), RuntimeError> {
        self.record(Call::CreateNetwork(name.to_string()));
        self.gate(Op::CreateNetwork).await?;
        if *self.conflict_on_network_create.lock().unwrap() || self.has_network(name) {
            return Err(RuntimeError::AlreadyExists(format!(
                "network with name {} already exists",
                name
            )));
        }
        self.networks.lock().unwrap().push(name.to_string());
        Ok(())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        self.record(Call::ConnectNetwork {
            network: network.to_string(),
            container: container.to_string(),
        });
        self.gate(Op::ConnectNetwork).await
    }

    async fn list_containers(&self, name_filter: &str) -> Result<Vec<ContainerSummary>, RuntimeError> {
        self.record(Call::ListContainers(name_filter.to_string()));
        self.gate(Op::ListContainers).await?;
        Ok(self
            .containers
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.names.iter().any(|n| n.contains(name_filter)))
            .cloned()
            .collect())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<String, RuntimeError> {
        self.record(Call::CreateContainer(spec.name.clone()));
        self.gate(Op::CreateContainer).await?;
        let mut containers = self.containers.lock().unwrap();
        if containers.iter().any(|c| c.has_name(&spec.name)) {
            return Err(RuntimeError::AlreadyExists(format!(
                "container name /{} is already in use",
                spec.name
            )));
        }
        let id = Uuid::new_v4().simple().to_string();
        containers.push(ContainerSummary {
            id: id.clone(),
            names: vec![format!("/{}", spec.name)],
            image: spec.image.clone(),
            state: "created".to_string(),
        });
        Ok(id)
    }

    async fn upload_archive(&self, container: &str, dir: &str, archive: Bytes) -> Result<(), RuntimeError> {
        self.record(Call::UploadArchive {
            container: container.to_string(),
            dir: dir.to_string(),
            archive,
        });
        self.gate(Op::UploadArchive).await
    }

    async fn start_container(&self, container: &str) -> Result<(), RuntimeError> {
        self.record(Call::StartContainer(container.to_string()));
        self.gate(Op::StartContainer).await
    }

    async fn remove_container(&self, container: &str, force: bool) -> Result<(), RuntimeError> {
        self.record(Call::RemoveContainer {
            container: container.to_string(),
            force,
        });
        self.gate(Op::RemoveContainer).await?;
        let mut containers = self.containers.lock().unwrap();
        let before = containers.len();
        containers.retain(|c| c.id != container && !c.has_name(container));
        if containers.len() == before {
            return Err(RuntimeError::NotFound(format!(
                "no such container: {}",
                container
            )));
        }
        Ok(())
    }

    fn container_logs(&self, container: &str, follow: bool) -> FrameStream {
        self.record(Call::ContainerLogs {
            container: container.to_string(),
            follow,
        });
        match self.log_streams.lock().unwrap().pop_front() {
            Some(frames) => frames,
            None => stream::empty().boxed(),
        }
    }
}
