//! Topic-based routing of raw records into typed queues.
//!
//! The router runs on the poll thread and is the bridge between the
//! blocking source and the async pipeline. Each known topic maps to
//! exactly one bounded queue; `blocking_send` on a full queue is what
//! propagates backpressure all the way to the broker poll.

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::RelayError;
use crate::event::RawEvent;

/// Dispatches raw records to the per-topic event queues.
#[derive(Debug)]
pub struct EventRouter {
    notify_topic: String,
    message_topic: String,
    notify_tx: mpsc::Sender<RawEvent>,
    message_tx: mpsc::Sender<RawEvent>,
}

impl EventRouter {
    /// Creates a router over the two typed queues.
    #[must_use]
    pub fn new(
        notify_topic: impl Into<String>,
        message_topic: impl Into<String>,
        notify_tx: mpsc::Sender<RawEvent>,
        message_tx: mpsc::Sender<RawEvent>,
    ) -> Self {
        Self {
            notify_topic: notify_topic.into(),
            message_topic: message_topic.into(),
            notify_tx,
            message_tx,
        }
    }

    /// The topics this router accepts, for source subscription.
    #[must_use]
    pub fn topics(&self) -> Vec<String> {
        vec![self.notify_topic.clone(), self.message_topic.clone()]
    }

    /// Routes a record to its queue, blocking while the queue is full.
    ///
    /// Records from unknown topics are dropped with a log line. Must be
    /// called from the dedicated poll thread, never from an async task.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::QueueClosed`] once the receiving loop has
    /// shut down.
    pub fn route_blocking(&self, event: RawEvent) -> Result<(), RelayError> {
        let tx = if event.stream_id == self.notify_topic {
            &self.notify_tx
        } else if event.stream_id == self.message_topic {
            &self.message_tx
        } else {
            debug!(topic = %event.stream_id, "record from unrouted topic dropped");
            return Ok(());
        };

        tx.blocking_send(event).map_err(|_| RelayError::QueueClosed)
    }
}
