use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use log::debug;
use tokio_util::sync::CancellationToken;

use crate::container_management::runtime::{cancellable, ContainerRuntime};
use crate::container_management::types::ConfigFile;
use crate::error_handling::types::RuntimeError;

/// Mode of every injected file: regular, non-executable.
const CONFIG_FILE_MODE: u32 = 0o644;

/// Packs `file` into a single-entry tar archive named after its final path
/// segment. The archive is extracted into [`ConfigFile::dir`].
pub fn build_archive(file: &ConfigFile) -> Result<Bytes, RuntimeError> {
    let name = file.file_name();
    if name.is_empty() {
        return Err(RuntimeError::InvalidArgument(format!(
            "config file path '{}' has no file name",
            file.path
        )));
    }

    let mut header = tar::Header::new_gnu();
    header.set_entry_type(tar::EntryType::Regular);
    header.set_size(file.content.len() as u64);
    header.set_mode(CONFIG_FILE_MODE);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);

    let mut builder = tar::Builder::new(Vec::new());
    builder.append_data(&mut header, name, file.content.as_ref())?;
    Ok(Bytes::from(builder.into_inner()?))
}

/// Writes config files into a created-but-not-started container, one archive
/// upload per file.
pub struct ConfigFileInjector {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ConfigFileInjector {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    pub async fn inject(
        &self,
        container: &str,
        files: &[ConfigFile],
        cancel: &CancellationToken,
    ) -> Result<(), RuntimeError> {
        for file in files {
            let archive = build_archive(file)?;
            debug!(
                "Injecting {} ({} bytes) into container {}",
                file.path,
                file.content.len(),
                container
            );
            cancellable(
                cancel,
                self.runtime.upload_archive(container, file.dir(), archive),
            )
            .await?;
        }
        Ok(())
    }
}
