//! Attaches to a container's output and turns it into a sequence of
//! timestamped, origin-tagged [`LogRecord`]s.
//!
//! One background task per attachment decodes frames and hands records to
//! the consumer through a single-slot channel, so the task stops reading
//! from the runtime whenever the consumer stops reading records. The
//! terminal outcome travels through a separate one-shot slot:
//!
//! ```text
//! Attached -> Streaming -> Completed | Failed
//! ```
//!
//! There is no reconnection. A caller that wants more output attaches again.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures_util::{Stream, StreamExt};
use log::{debug, trace};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::container_management::runtime::{ContainerRuntime, FrameStream};
use crate::error_handling::types::LogStreamError;
use crate::log_streaming::types::{LogOrigin, LogRecord, StreamState};

/// Splits a chunk into its leading RFC 3339 timestamp token and payload.
///
/// The token is everything before the first space. When it is missing or
/// does not parse, the whole chunk becomes the payload and the timestamp is
/// `None`. The payload is copied out of `chunk`.
pub fn split_record(origin: LogOrigin, chunk: &[u8]) -> LogRecord {
    let (timestamp, payload) = match chunk.iter().position(|b| *b == b' ') {
        Some(index) if index > 0 => match parse_timestamp(&chunk[..index]) {
            Some(ts) => (Some(ts), &chunk[index + 1..]),
            None => (None, chunk),
        },
        _ => (None, chunk),
    };

    LogRecord {
        timestamp,
        origin,
        payload: Bytes::copy_from_slice(payload),
    }
}

fn parse_timestamp(token: &[u8]) -> Option<DateTime<Utc>> {
    let token = std::str::from_utf8(token).ok()?;
    DateTime::parse_from_rfc3339(token)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

pub struct LogStreamDemuxer {
    runtime: Arc<dyn ContainerRuntime>,
}

impl LogStreamDemuxer {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    /// Opens the container's log stream and starts decoding it in the
    /// background. With `follow`, the sequence runs until the process exits
    /// or `cancel` fires; otherwise it ends after the buffered output.
    pub fn attach(&self, container: &str, follow: bool, cancel: &CancellationToken) -> LogSequence {
        let frames = self.runtime.container_logs(container, follow);
        let sequence = LogSequence::spawn(frames, cancel.child_token());
        debug!(
            "[{}] attached to logs of {} (follow={})",
            sequence.id(),
            container,
            follow
        );
        sequence
    }
}

/// Consumer side of a log attachment.
///
/// Yields records in wire arrival order, then at most one error describing
/// why the stream failed. A clean end of stream yields no error. Dropping the
/// sequence stops the background task.
pub struct LogSequence {
    id: Uuid,
    records: mpsc::Receiver<LogRecord>,
    outcome: Option<oneshot::Receiver<Result<(), LogStreamError>>>,
    state: StreamState,
    cancel: CancellationToken,
}

impl LogSequence {
    /// Starts the decode task over `frames`. Cancelling `cancel` ends the
    /// sequence with [`LogStreamError::Cancelled`].
    pub fn spawn(frames: FrameStream, cancel: CancellationToken) -> Self {
        let id = Uuid::new_v4();
        let (tx, records) = mpsc::channel(1);
        let (done, outcome) = oneshot::channel();

        tokio::spawn(pump(id, frames, tx, done, cancel.clone()));

        Self {
            id,
            records,
            outcome: Some(outcome),
            state: StreamState::Attached,
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Stops the attachment. Already-handed-off records may still be
    /// yielded before the cancellation error.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Stream for LogSequence {
    type Item = Result<LogRecord, LogStreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state.is_terminal() {
            return Poll::Ready(None);
        }

        match this.records.poll_recv(cx) {
            Poll::Ready(Some(record)) => {
                this.state = StreamState::Streaming;
                return Poll::Ready(Some(Ok(record)));
            }
            Poll::Ready(None) => {}
            Poll::Pending => return Poll::Pending,
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(None);
        };
        let res = match Pin::new(outcome).poll(cx) {
            Poll::Ready(res) => res,
            Poll::Pending => return Poll::Pending,
        };
        this.outcome = None;

        match res {
            Ok(Ok(())) => {
                debug!("[{}] log stream completed", this.id);
                this.state = StreamState::Completed;
                Poll::Ready(None)
            }
            Ok(Err(e)) => {
                debug!("[{}] log stream failed: {}", this.id, e);
                this.state = StreamState::Failed;
                Poll::Ready(Some(Err(e)))
            }
            Err(_) => {
                this.state = StreamState::Failed;
                Poll::Ready(Some(Err(LogStreamError::Frame(
                    "log task exited without an outcome".to_string(),
                ))))
            }
        }
    }
}

impl Drop for LogSequence {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Background half: frames in, records out, then the terminal outcome.
async fn pump(
    id: Uuid,
    mut frames: FrameStream,
    tx: mpsc::Sender<LogRecord>,
    done: oneshot::Sender<Result<(), LogStreamError>>,
    cancel: CancellationToken,
) {
    trace!("[{}] log task started", id);
    let mut delivered = 0usize;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(LogStreamError::Cancelled),
            next = frames.next() => next,
        };
        let frame = match next {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        };

        let record = split_record(frame.origin, &frame.payload);
        trace!(
            "[{}] {:?} {} bytes: {}",
            id,
            record.origin,
            record.payload.len(),
            String::from_utf8_lossy(&record.payload[..record.payload.len().min(64)])
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Err(LogStreamError::Cancelled),
            sent = tx.send(record) => {
                if sent.is_err() {
                    debug!("[{}] log consumer went away", id);
                    break Err(LogStreamError::Cancelled);
                }
            }
        }
        delivered += 1;
    };

    // Runtime stream is closed before the outcome becomes observable.
    drop(frames);
    drop(tx);
    trace!("[{}] log task finished after {} records", id, delivered);
    let _ = done.send(outcome);
}
