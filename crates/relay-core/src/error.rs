//! Pipeline error types.
//!
//! Provides the error hierarchy for the relay pipeline:
//! - [`RelayError`]: top-level error for pipeline operations
//! - [`DecodeError`]: change-event envelope decoding errors
//!
//! Per-event errors are logged by the consumption loops and never
//! propagate far enough to terminate a loop.

use thiserror::Error;

/// Errors that can occur while processing a change event.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The event payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// A stream source poll failed.
    #[error("stream source error: {0}")]
    Source(String),

    /// A subscriber store operation failed.
    #[error("subscriber store error: {0}")]
    Store(String),

    /// An enrichment lookup failed (store unavailable or bad reply).
    #[error("enrichment lookup failed: {0}")]
    Lookup(String),

    /// The outbound transport rejected a message.
    #[error("transport error: {0}")]
    Transport(String),

    /// The dispatch queue has been closed (shutdown in progress).
    #[error("dispatch queue closed")]
    QueueClosed,

    /// Invalid pipeline configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors that occur while decoding a CDC envelope.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(String),

    /// The record carried no payload for its operation.
    #[error("missing payload for op '{0}'")]
    MissingPayload(&'static str),
}

impl From<serde_json::Error> for DecodeError {
    fn from(e: serde_json::Error) -> Self {
        DecodeError::Json(e.to_string())
    }
}
