//! Container log streaming
//!
//! Turns the runtime's multiplexed stdout/stderr transport into an ordered
//! sequence of timestamped records.
//!
//! Components:
//! - `types`: frames, records and stream states.
//! - `frame_codec`: decoder for the raw 8-byte-header frame format.
//! - `demuxer`: attaches to a container and produces a cancellable `LogSequence`.

pub mod demuxer;
pub mod frame_codec;
pub mod types;

pub use demuxer::{LogSequence, LogStreamDemuxer};
pub use types::{LogFrame, LogOrigin, LogRecord, StreamState};
