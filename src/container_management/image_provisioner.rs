use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures_util::StreamExt;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::container_management::runtime::{cancellable, ContainerRuntime};
use crate::container_management::types::RegistryAuth;
use crate::error_handling::types::RuntimeError;

/// Path prefixes under which the default registry stores official images.
/// Local inventories list those images by their short name.
const DEFAULT_REGISTRY_PREFIXES: [&str; 2] = ["docker.io/library/", "index.docker.io/library/"];

/// Credential payload carried (base64-encoded JSON) in the registry auth token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryCredential {
    pub serveraddress: String,
    pub username: String,
    pub password: String,
    /// base64 of `username:password`.
    pub auth: String,
}

impl From<&RegistryAuth> for RegistryCredential {
    fn from(auth: &RegistryAuth) -> Self {
        Self {
            serveraddress: auth.host.clone(),
            username: auth.username.clone(),
            password: auth.password.clone(),
            auth: STANDARD.encode(format!("{}:{}", auth.username, auth.password)),
        }
    }
}

/// Builds the opaque pull token: base64(JSON(credential)).
pub fn encode_registry_token(auth: &RegistryAuth) -> Result<String, RuntimeError> {
    let secret = serde_json::to_vec(&RegistryCredential::from(auth)).map_err(|e| {
        RuntimeError::InvalidArgument(format!("unable to encode registry credentials: {}", e))
    })?;
    Ok(STANDARD.encode(secret))
}

pub fn decode_registry_token(token: &str) -> Result<RegistryCredential, RuntimeError> {
    let json = STANDARD.decode(token).map_err(|e| {
        RuntimeError::InvalidArgument(format!("registry token is not valid base64: {}", e))
    })?;
    serde_json::from_slice(&json).map_err(|e| {
        RuntimeError::InvalidArgument(format!("registry token is not a credential payload: {}", e))
    })
}

/// Strips default-registry prefixes so `docker.io/library/nginx` and
/// `index.docker.io/library/nginx` both check presence as `nginx`.
pub fn normalize_image_reference(image: &str) -> &str {
    DEFAULT_REGISTRY_PREFIXES
        .iter()
        .fold(image, |image, prefix| image.strip_prefix(prefix).unwrap_or(image))
}

/// Makes sure an image is available locally before a container uses it.
pub struct ImageProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ImageProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Returns once `image` is committed locally, pulling it if needed.
    ///
    /// A present image costs a single list call. Otherwise the pull stream is
    /// drained to completion; any pull error is returned unretried.
    pub async fn ensure(
        &self,
        image: &str,
        auth: Option<&RegistryAuth>,
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        let image = normalize_image_reference(image);

        let present = cancellable(cancel, self.runtime.list_images(image)).await?;
        if !present.is_empty() {
            debug!("Image {} already present locally", image);
            return Ok(());
        }

        let token = auth.map(encode_registry_token).transpose()?;
        info!(
            "Pulling image {}{}",
            image,
            if token.is_some() { " with registry credentials" } else { "" }
        );

        let mut progress = self.runtime.pull_image(image, token.as_deref());
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RuntimeError::Cancelled),
                next = progress.next() => next,
            };
            match next {
                Some(Ok(p)) => debug!(
                    "pull {}: {} {}",
                    image,
                    p.id.as_deref().unwrap_or("-"),
                    p.status.as_deref().unwrap_or("")
                ),
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }

        info!("Pulled image {}", image);
        Ok(())
    }
}
