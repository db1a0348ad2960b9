//! Unidirectional progress streaming from a pipeline task to one subscriber.
//!
//! Each long-running pipeline owns a [`ProgressSender`] and the caller holds
//! the matching [`ProgressReceiver`]. The sender enforces the channel
//! contract:
//!
//! - `progress` is monotonically non-decreasing: a stale value is clamped up
//!   to the highest value already emitted;
//! - exactly one terminal event (`complete` or `error`) is delivered, after
//!   which further emissions are dropped;
//! - a subscriber hanging up never fails the producer — send errors are
//!   swallowed and the pipeline keeps running to finish its committed side
//!   effects.
//!
//! Events serialize to the wire frames used by the SSE surface:
//! `data: {"type":"processing","progress":42}\n\n`.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// A progress event as seen by the subscriber.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// Work is ongoing; `progress` is in `0..=100`.
    Processing { progress: u8 },
    /// Terminal success; `progress` is always 100.
    Complete { progress: u8 },
    /// Terminal failure; `progress` is always 0.
    Error { progress: u8, reason: String },
}

impl ProgressEvent {
    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressEvent::Processing { .. })
    }

    /// Encode this event as a single SSE frame.
    pub fn to_sse_frame(&self) -> String {
        // Serialization of this enum cannot fail: all fields are plain data.
        let json = serde_json::to_string(self).unwrap_or_default();
        format!("data: {json}\n\n")
    }
}

/// Producer half of a progress stream.
#[derive(Clone)]
pub struct ProgressSender {
    tx: flume::Sender<ProgressEvent>,
    high_water: Arc<AtomicU8>,
    terminated: Arc<AtomicBool>,
}

/// Subscriber half of a progress stream.
pub struct ProgressReceiver {
    rx: flume::Receiver<ProgressEvent>,
}

/// Create a linked sender/receiver pair with the given buffer capacity.
pub fn channel(capacity: usize) -> (ProgressSender, ProgressReceiver) {
    let (tx, rx) = flume::bounded(capacity.max(1));
    (
        ProgressSender {
            tx,
            high_water: Arc::new(AtomicU8::new(0)),
            terminated: Arc::new(AtomicBool::new(false)),
        },
        ProgressReceiver { rx },
    )
}

impl ProgressSender {
    /// Emit a processing event. Values regressing below the high-water mark
    /// are raised to it; values above 100 are clamped down.
    pub fn processing(&self, progress: u8) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        let progress = progress.min(100);
        let clamped = self.high_water.fetch_max(progress, Ordering::AcqRel).max(progress);
        let _ = self.tx.send(ProgressEvent::Processing { progress: clamped });
    }

    /// Emit the terminal completion event. Only the first terminal event wins.
    pub fn complete(&self) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        self.high_water.store(100, Ordering::Release);
        let _ = self.tx.send(ProgressEvent::Complete { progress: 100 });
    }

    /// Emit the terminal error event. Only the first terminal event wins.
    pub fn error(&self, reason: impl Into<String>) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(ProgressEvent::Error {
            progress: 0,
            reason: reason.into(),
        });
    }

    /// Whether a terminal event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::Acquire)
    }
}

impl ProgressReceiver {
    /// Await the next event; `None` once the stream has ended.
    pub async fn recv(&self) -> Option<ProgressEvent> {
        self.rx.recv_async().await.ok()
    }

    /// Drain every event currently buffered without awaiting.
    pub fn drain(&self) -> Vec<ProgressEvent> {
        self.rx.try_iter().collect()
    }

    /// Adapt the receiver into an async `Stream`, e.g. for an SSE bridge.
    pub fn into_stream(self) -> impl futures_util::Stream<Item = ProgressEvent> {
        self.rx.into_stream()
    }

    /// Collect events until the terminal event (inclusive) or the producer
    /// goes away.
    pub async fn collect_to_end(&self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.recv().await {
            let terminal = event.is_terminal();
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }
}
