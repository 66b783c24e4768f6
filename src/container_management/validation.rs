//! Input checks run before any runtime call. Everything here fails with
//! `RuntimeError::InvalidArgument`.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::container_management::types::ContainerSpec;
use crate::error_handling::types::RuntimeError;

static CONTAINER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9_.-]*$").expect("valid regex"));

static SYSTEM_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9-]+[a-z0-9]$").expect("valid regex"));

/// Project identifiers double as network names.
pub fn validate_project_id(project_id: &str) -> Result<(), RuntimeError> {
    let len = project_id.len();
    if !(3..=63).contains(&len) {
        return Err(RuntimeError::InvalidArgument(format!(
            "project id '{}' must be between 3 and 63 characters long",
            project_id
        )));
    }
    if !SYSTEM_NAME.is_match(project_id) {
        return Err(RuntimeError::InvalidArgument(format!(
            "project id '{}' can only contain a-z, 0-9 and '-'",
            project_id
        )));
    }
    Ok(())
}

pub fn validate_container_name(name: &str) -> Result<(), RuntimeError> {
    if !CONTAINER_NAME.is_match(name) {
        return Err(RuntimeError::InvalidArgument(format!(
            "invalid container name '{}'",
            name
        )));
    }
    Ok(())
}

pub fn validate_image(image: &str) -> Result<(), RuntimeError> {
    if image.is_empty() || image.chars().any(char::is_whitespace) {
        return Err(RuntimeError::InvalidArgument(format!(
            "invalid image reference '{}'",
            image
        )));
    }
    Ok(())
}

impl ContainerSpec {
    pub fn validate(&self) -> Result<(), RuntimeError> {
        validate_container_name(&self.name)?;
        validate_image(&self.image)?;

        for key in self.env.keys() {
            if key.is_empty() || key.contains('=') {
                return Err(RuntimeError::InvalidArgument(format!(
                    "invalid environment variable name '{}'",
                    key
                )));
            }
        }

        let mut seen = HashSet::new();
        for file in &self.files {
            if !file.path.starts_with('/') || file.path.ends_with('/') {
                return Err(RuntimeError::InvalidArgument(format!(
                    "config file path '{}' must be an absolute file path",
                    file.path
                )));
            }
            if !seen.insert(file.path.as_str()) {
                return Err(RuntimeError::InvalidArgument(format!(
                    "config file path '{}' is listed more than once",
                    file.path
                )));
            }
        }

        for mount in &self.mounts {
            if !mount.target.starts_with('/') {
                return Err(RuntimeError::InvalidArgument(format!(
                    "mount target '{}' must be an absolute path",
                    mount.target
                )));
            }
        }
        Ok(())
    }
}
