//! Core types used by the container management subsystem.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Desired state of a single capsule instance running as a local container.
///
/// The `name` is the container identity: no runtime id is tracked, every
/// lookup goes back through the runtime by name.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ContainerSpec {
    /// Logical name, unique per project (e.g. `web-0`).
    pub name: String,
    /// Image reference, qualified or short (`nginx`, `ghcr.io/org/app:1.2`).
    pub image: String,
    /// Command override; empty keeps the image entrypoint/cmd.
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<PortMapping>,
    #[serde(default)]
    pub mounts: Vec<Mount>,
    /// Files written into the container filesystem before it starts.
    #[serde(default)]
    pub files: Vec<ConfigFile>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    /// Host port to publish on; `None` lets the runtime pick one.
    #[serde(default)]
    pub host_port: Option<u16>,
    #[serde(default = "default_protocol")]
    pub protocol: String,
}

fn default_protocol() -> String {
    "tcp".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Mount {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub read_only: bool,
}

/// A virtual file injected into a container before start.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "RawConfigFile")]
pub struct ConfigFile {
    /// Absolute path inside the container.
    pub path: String,
    pub content: Bytes,
}

#[derive(Deserialize)]
struct RawConfigFile {
    path: String,
    #[serde(default)]
    content: String,
}

impl From<RawConfigFile> for ConfigFile {
    fn from(raw: RawConfigFile) -> Self {
        ConfigFile::new(raw.path, raw.content.into_bytes())
    }
}

impl ConfigFile {
    pub fn new(path: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Destination directory: everything before the final path segment.
    pub fn dir(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some(("", _)) | None => "/",
            Some((dir, _)) => dir,
        }
    }

    /// Archive entry name: the final path segment.
    pub fn file_name(&self) -> &str {
        match self.path.rsplit_once('/') {
            Some((_, name)) => name,
            None => &self.path,
        }
    }
}

/// Registry credentials supplied per pull, never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegistryAuth {
    pub host: String,
    pub username: String,
    pub password: String,
}

/// Snapshot of a container as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    /// Names as the runtime reports them (Docker prefixes them with `/`).
    pub names: Vec<String>,
    pub image: String,
    pub state: String,
}

impl ContainerSummary {
    /// Whether one of the names equals `name`, ignoring the leading `/`.
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n) == name)
    }

    pub fn has_name_prefix(&self, prefix: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').unwrap_or(n).starts_with(prefix))
    }
}

/// Aggregate counters describing reconcile outcomes since manager init.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerStats {
    /// Containers successfully created.
    pub total_created: u64,
    /// Creations that first removed a same-named container.
    pub total_replaced: u64,
    /// Containers created but left unstarted.
    pub failed_starts: u64,
    /// Reconciles that returned an error.
    pub failed_count: u64,
}

/// One progress message from an image pull.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullProgress {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Outcome of a deploy. Best-effort steps report their result here instead
/// of failing the call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeployResult {
    pub name: String,
    pub network: String,
    /// A same-named container existed and was force-removed first.
    pub replaced: bool,
    pub started: bool,
    pub network_attached: bool,
}
