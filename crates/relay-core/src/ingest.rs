//! Blocking stream source trait and the dedicated poll thread.
//!
//! Broker clients with blocking poll APIs must not run on the async
//! runtime, so ingestion owns one OS thread. The thread polls with a
//! short timeout, hands records to the [`EventRouter`], and re-checks
//! the shutdown flag between polls. Backpressure reaches this thread
//! through the router's blocking handoff.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::error::RelayError;
use crate::event::RawEvent;
use crate::router::EventRouter;

/// A blocking record source, typically a broker consumer.
///
/// Implementations are driven from a dedicated OS thread and may block
/// for up to the given timeout per call.
pub trait BlockingStreamSource: Send {
    /// Polls for the next record.
    ///
    /// Returns `Ok(None)` when no record arrived within `timeout`.
    /// Tombstones and empty payloads must be filtered out here and
    /// reported as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Source`] for transient broker failures;
    /// the poll loop logs them and keeps polling.
    fn poll(&mut self, timeout: Duration) -> Result<Option<RawEvent>, RelayError>;
}

/// Handle to the running poll thread.
#[derive(Debug)]
pub struct IngestHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<thread::JoinHandle<()>>,
}

impl IngestHandle {
    /// Signals shutdown and joins the poll thread.
    ///
    /// The thread observes the flag after its in-flight poll completes,
    /// so this blocks for at most one poll timeout plus one handoff.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("ingest thread panicked");
            }
        }
    }
}

/// Spawns the dedicated poll thread.
///
/// The loop runs until [`IngestHandle::shutdown`] is called or the
/// downstream queues close. Poll errors are logged and polling
/// continues; no record that was successfully polled is dropped short
/// of routing.
///
/// # Errors
///
/// Returns [`RelayError::Config`] if the OS refuses the thread.
pub fn spawn_poll_thread(
    mut source: Box<dyn BlockingStreamSource>,
    router: EventRouter,
    poll_timeout: Duration,
) -> Result<IngestHandle, RelayError> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);

    let thread = thread::Builder::new()
        .name("relay-ingest".to_string())
        .spawn(move || {
            info!("ingest poll thread started");
            while !flag.load(Ordering::Relaxed) {
                match source.poll(poll_timeout) {
                    Ok(Some(event)) => {
                        if let Err(RelayError::QueueClosed) = router.route_blocking(event) {
                            info!("event queues closed, ingest thread exiting");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "stream poll failed"),
                }
            }
            info!("ingest poll thread stopped");
        })
        .map_err(|e| RelayError::Config(format!("failed to spawn ingest thread: {e}")))?;

    Ok(IngestHandle {
        shutdown,
        thread: Some(thread),
    })
}
