use serde::Deserialize;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// How to reach the container runtime.
#[derive(Debug, PartialEq, Clone, Deserialize)]
pub struct RuntimeSettings {
    /// Endpoint such as `unix:///var/run/docker.sock` or `tcp://127.0.0.1:2375`.
    /// Unset means the platform's local default.
    #[serde(default)]
    pub host: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            host: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}
