use super::types::*;
use crate::container_management::types::{ContainerSpec, RegistryAuth};
use crate::container_management::validation::validate_project_id;
use crate::error_handling::types::ConfigError;
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Deployment configuration read from a TOML file.
///
/// The file describes where the runtime lives, which project the container
/// belongs to, optional registry credentials and the container itself:
///
/// ```toml
/// project_id = "shop"
///
/// [runtime]
/// host = "unix:///var/run/docker.sock"
/// timeout_secs = 60
///
/// [registry]
/// host = "ghcr.io"
/// username = "deployer"
/// password = "..."
///
/// [container]
/// name = "web-0"
/// image = "nginx:1.25"
/// env = { MODE = "dev" }
///
/// [[container.ports]]
/// container_port = 80
/// host_port = 8080
///
/// [[container.files]]
/// path = "/etc/nginx/conf.d/app.conf"
/// content = "server { listen 80; }"
/// ```
///
/// # Fields Overview
///
/// - `runtime`: connection settings, defaults to the local socket
/// - `project_id`: project identifier, also the name of the project network
/// - `registry`: credentials used only when the image has to be pulled
/// - `container`: the desired container, see [`ContainerSpec`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub runtime: RuntimeSettings,
    pub project_id: String,
    #[serde(default)]
    pub registry: Option<RegistryAuth>,
    pub container: ContainerSpec,
}

impl Config {
    /// Reads and validates the configuration at `path`.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        debug!("Reading configuration from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(raw).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values that would otherwise only fail once the runtime is
    /// contacted.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "runtime.timeout_secs must be greater than 0".to_string(),
            ));
        }
        validate_project_id(&self.project_id)
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        self.container
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
project_id = "shop"

[runtime]
host = "tcp://127.0.0.1:2375"
timeout_secs = 30

[registry]
host = "ghcr.io"
username = "deployer"
password = "hunter2"

[container]
name = "web-0"
image = "docker.io/library/nginx"
command = ["nginx", "-g", "daemon off;"]
env = { MODE = "dev" }
labels = { capsule = "web" }

[[container.ports]]
container_port = 80
host_port = 8080

[[container.mounts]]
source = "/srv/www"
target = "/usr/share/nginx/html"
read_only = true

[[container.files]]
path = "/etc/app/conf.yaml"
content = "k: v"
"#;

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();

        let config = Config::from_file(file.path()).unwrap_or_else(|e| panic!("{}", e));

        assert_eq!(config.project_id, "shop");
        assert_eq!(config.runtime.host.as_deref(), Some("tcp://127.0.0.1:2375"));
        assert_eq!(config.runtime.timeout_secs, 30);
        assert_eq!(config.registry.as_ref().unwrap().username, "deployer");
        assert_eq!(config.container.name, "web-0");
        assert_eq!(config.container.command.len(), 3);
        assert_eq!(config.container.env.get("MODE").map(String::as_str), Some("dev"));
        assert_eq!(config.container.ports[0].protocol, "tcp");
        assert!(config.container.mounts[0].read_only);
        assert_eq!(config.container.files[0].file_name(), "conf.yaml");
        assert_eq!(&config.container.files[0].content[..], b"k: v");
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_toml_str(
            r#"
project_id = "shop"
[container]
name = "web-0"
image = "nginx"
"#,
        )
        .unwrap();
        assert_eq!(config.runtime, RuntimeSettings::default());
        assert!(config.registry.is_none());
        assert!(config.container.files.is_empty());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let bad_project = FULL.replace("project_id = \"shop\"", "project_id = \"Shop!\"");
        assert!(matches!(
            Config::from_toml_str(&bad_project),
            Err(ConfigError::InvalidValue(_))
        ));

        let bad_path = FULL.replace("/etc/app/conf.yaml", "etc/app/conf.yaml");
        assert!(matches!(
            Config::from_toml_str(&bad_path),
            Err(ConfigError::InvalidValue(_))
        ));

        let zero_timeout = FULL.replace("timeout_secs = 30", "timeout_secs = 0");
        assert!(Config::from_toml_str(&zero_timeout).is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            Config::from_toml_str("project_id = "),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/capsule.toml")),
            Err(ConfigError::IoError(_))
        ));
    }
}
