//! Container management subsystem.
//!
//! This module reconciles a desired [`ContainerSpec`] against a local
//! container runtime. All runtime access goes through the
//! [`ContainerRuntime`] trait; [`DockerRuntime`] implements it over the
//! Docker Engine API.
//!
//! Components:
//! - `image_provisioner`: makes an image available locally, pulling if needed.
//! - `network_provisioner`: makes the per-project network exist.
//! - `file_injector`: writes configuration files into a created container.
//! - `container_query`: looks containers up by exact name or name prefix.
//! - `container_manager`: the reconciler tying the above together.
//!
//! Re-exports:
//! - [`ContainerManager`]: main entry point to deploy/teardown containers.
//! - [`ContainerSpec`], [`ContainerStats`], [`DeployResult`]: core types.
//!
//! Example (non-running):
//! ```ignore
//! use std::sync::Arc;
//! use capsule_local::configuration::RuntimeSettings;
//! use capsule_local::container_management::{ContainerManager, DockerRuntime};
//! use tokio_util::sync::CancellationToken;
//!
//! let runtime = DockerRuntime::connect(&RuntimeSettings::default()).await?;
//! let manager = ContainerManager::new(Arc::new(runtime));
//! let result = manager.deploy("shop", &spec, None, &CancellationToken::new()).await?;
//! println!("started: {}", result.started);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod container_manager;
pub mod container_query;
pub mod docker_runtime;
pub mod file_injector;
pub mod image_provisioner;
#[cfg(test)]
pub mod integration_tests;
#[cfg(test)]
pub(crate) mod mock_runtime;
pub mod network_provisioner;
pub mod runtime;
pub mod types;
pub mod validation;

pub use container_manager::ContainerManager;
pub use docker_runtime::DockerRuntime;
pub use runtime::ContainerRuntime;
pub use types::{ContainerSpec, ContainerStats, DeployResult, RegistryAuth};
