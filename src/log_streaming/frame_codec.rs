//! Decoder for the runtime's multiplexed log transport.
//!
//! Each frame is an 8-byte header followed by its payload:
//!
//! ```text
//! [stream, 0, 0, 0, len_be32 ...] payload[len]
//! ```
//!
//! `stream` is 0 (stdin), 1 (stdout), 2 (stderr) or 3 (system error).

use bytes::{Buf, BytesMut};
use tokio::io::AsyncRead;
use tokio_util::codec::{Decoder, FramedRead};

use crate::container_management::runtime::FrameStream;
use crate::error_handling::types::LogStreamError;
use crate::log_streaming::types::{LogFrame, LogOrigin};

pub const HEADER_LEN: usize = 8;

/// Upper bound on buffer space reserved ahead of a frame's payload. The
/// length field comes off the wire; larger frames grow the buffer as bytes
/// actually arrive.
const MAX_RESERVE: usize = 64 * 1024;

const STREAM_STDIN: u8 = 0;
const STREAM_STDOUT: u8 = 1;
const STREAM_STDERR: u8 = 2;
const STREAM_SYSTEM_ERR: u8 = 3;

#[derive(Debug, Default)]
pub struct MultiplexCodec;

impl Decoder for MultiplexCodec {
    type Item = LogFrame;
    type Error = LogStreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogFrame>, LogStreamError> {
        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let stream = src[0];
        let len = u32::from_be_bytes([src[4], src[5], src[6], src[7]]) as usize;
        if src.len() < HEADER_LEN + len {
            src.reserve((HEADER_LEN + len - src.len()).min(MAX_RESERVE));
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len).freeze();

        let origin = match stream {
            STREAM_STDIN | STREAM_STDOUT => LogOrigin::Stdout,
            STREAM_STDERR => LogOrigin::Stderr,
            STREAM_SYSTEM_ERR => {
                return Err(LogStreamError::Frame(format!(
                    "runtime reported: {}",
                    String::from_utf8_lossy(&payload)
                )))
            }
            other => {
                return Err(LogStreamError::Frame(format!(
                    "unrecognized stream id {}",
                    other
                )))
            }
        };
        Ok(Some(LogFrame { origin, payload }))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogFrame>, LogStreamError> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(LogStreamError::Frame(format!(
                "stream ended inside a frame ({} bytes left)",
                src.len()
            ))),
        }
    }
}

/// Decodes a raw multiplexed byte stream into frames.
pub fn frames_from_reader<R>(reader: R) -> FrameStream
where
    R: AsyncRead + Send + Unpin + 'static,
{
    Box::pin(FramedRead::new(reader, MultiplexCodec))
}

#[cfg(test)]
pub(crate) fn encode_frame(stream: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![stream, 0, 0, 0];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}
