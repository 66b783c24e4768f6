//! Data types shared by the log streaming subsystem.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which sub-stream of the multiplexed output a chunk came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogOrigin {
    Stdout,
    Stderr,
}

/// One decoded frame of the multiplexed log stream, before timestamp parsing.
#[derive(Debug, Clone, PartialEq)]
pub struct LogFrame {
    pub origin: LogOrigin,
    pub payload: Bytes,
}

/// A single log chunk emitted by a running container.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Parsed from the leading token of the chunk; `None` when the token is
    /// missing or malformed.
    pub timestamp: Option<DateTime<Utc>>,
    pub origin: LogOrigin,
    pub payload: Bytes,
}

/// Lifecycle of a log attachment. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Attached,
    Streaming,
    Completed,
    Failed,
}

impl StreamState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamState::Completed | StreamState::Failed)
    }
}
