use std::fmt;

#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    TomlError(String),
    InvalidValue(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::TomlError(e) => write!(f, "TOML parsing error: {}", e),
            ConfigError::InvalidValue(e) => write!(f, "Invalid configuration value: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::IoError(err)
    }
}

/// Failures raised while talking to the container runtime.
///
/// `NotFound` and `AlreadyExists` drive branching in the provisioners and are
/// rarely fatal on their own; `Unavailable` and `IoError` abort the calling
/// operation; `Cancelled` is propagated as-is.
#[derive(Debug)]
pub enum RuntimeError {
    NotFound(String),
    AlreadyExists(String),
    InvalidArgument(String),
    Unavailable(String),
    IoError(std::io::Error),
    Cancelled,
}

impl RuntimeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, RuntimeError::AlreadyExists(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RuntimeError::Cancelled)
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::NotFound(e) => write!(f, "Not found: {}", e),
            RuntimeError::AlreadyExists(e) => write!(f, "Already exists: {}", e),
            RuntimeError::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            RuntimeError::Unavailable(e) => write!(f, "Container runtime unavailable: {}", e),
            RuntimeError::IoError(e) => write!(f, "Container runtime IO error: {}", e),
            RuntimeError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::IoError(err)
    }
}

impl From<bollard::errors::Error> for RuntimeError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => RuntimeError::NotFound(message),
            bollard::errors::Error::DockerResponseServerError {
                status_code: 409,
                message,
            } => RuntimeError::AlreadyExists(message),
            bollard::errors::Error::IOError { err } => RuntimeError::IoError(err),
            other => RuntimeError::Unavailable(other.to_string()),
        }
    }
}

/// Terminal outcome of a log attachment that did not end cleanly.
#[derive(Debug)]
pub enum LogStreamError {
    Runtime(RuntimeError),
    Frame(String),
    Cancelled,
}

impl LogStreamError {
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            LogStreamError::Cancelled | LogStreamError::Runtime(RuntimeError::Cancelled)
        )
    }
}

impl fmt::Display for LogStreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogStreamError::Runtime(e) => write!(f, "Log stream runtime error: {}", e),
            LogStreamError::Frame(e) => write!(f, "Log stream frame error: {}", e),
            LogStreamError::Cancelled => write!(f, "Log stream cancelled"),
        }
    }
}

impl std::error::Error for LogStreamError {}

impl From<RuntimeError> for LogStreamError {
    fn from(err: RuntimeError) -> Self {
        match err {
            RuntimeError::Cancelled => LogStreamError::Cancelled,
            other => LogStreamError::Runtime(other),
        }
    }
}

impl From<std::io::Error> for LogStreamError {
    fn from(err: std::io::Error) -> Self {
        LogStreamError::Runtime(RuntimeError::IoError(err))
    }
}

#[derive(Debug)]
pub enum CliError {
    ConfigurationError(ConfigError),
    RuntimeError(RuntimeError),
    LogStreamError(LogStreamError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::ConfigurationError(e) => write!(f, "Configuration error: {}", e),
            CliError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
            CliError::LogStreamError(e) => write!(f, "Log stream error: {}", e),
        }
    }
}

impl std::error::Error for CliError {}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        CliError::ConfigurationError(err)
    }
}

impl From<RuntimeError> for CliError {
    fn from(err: RuntimeError) -> Self {
        CliError::RuntimeError(err)
    }
}

impl From<LogStreamError> for CliError {
    fn from(err: LogStreamError) -> Self {
        CliError::LogStreamError(err)
    }
}
