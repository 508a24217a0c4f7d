//! Raw stream records and typed change events.
//!
//! ## Envelope format
//!
//! Change events arrive as Debezium JSON envelopes:
//!
//! ```json
//! {
//!   "before": { ... },       // null for inserts
//!   "after":  { ... },       // null for deletes
//!   "source": { "ts_ms": 1234567890000 },
//!   "op": "c|u|d|r"
//! }
//! ```
//!
//! [`Envelope`] is generic over the row payload; the two row types this
//! pipeline consumes are [`NotifyRow`] (the notification table) and
//! [`PmRow`] (the direct-message table).

use serde::Deserialize;

use crate::error::DecodeError;

/// A raw record as produced by the stream source.
///
/// Ownership transfers down the pipeline; the record is discarded after
/// decoding.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// The stream (topic) the record arrived on.
    pub stream_id: String,
    /// The record's offset within its partition.
    pub offset: u64,
    /// Optional record key.
    pub key: Option<Vec<u8>>,
    /// The record payload. Never empty; tombstones are dropped at the
    /// source.
    pub value: Vec<u8>,
}

/// Debezium change operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ChangeOp {
    /// Row insert.
    #[serde(rename = "c")]
    Create,
    /// Row update.
    #[serde(rename = "u")]
    Update,
    /// Row delete.
    #[serde(rename = "d")]
    Delete,
    /// Snapshot read.
    #[serde(rename = "r")]
    Read,
}

impl ChangeOp {
    /// Returns the single-letter Debezium op code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeOp::Create => "c",
            ChangeOp::Update => "u",
            ChangeOp::Delete => "d",
            ChangeOp::Read => "r",
        }
    }
}

/// Source metadata carried by the envelope.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct SourceMeta {
    /// Event timestamp in milliseconds, as recorded by the capture
    /// process.
    #[serde(default)]
    pub ts_ms: i64,
}

/// A Debezium CDC envelope over a typed row payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    /// Row state before the change; absent for inserts and often
    /// absent for updates when the capture is not configured to emit
    /// full before-images.
    pub before: Option<T>,
    /// Row state after the change; absent for deletes.
    pub after: Option<T>,
    /// The change operation.
    pub op: ChangeOp,
    /// Capture metadata.
    #[serde(default)]
    pub source: Option<SourceMeta>,
}

impl<T: for<'de> Deserialize<'de>> Envelope<T> {
    /// Decodes an envelope from raw payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] if the payload is not a valid
    /// envelope for `T`.
    pub fn decode(payload: &[u8]) -> Result<Self, DecodeError> {
        Ok(serde_json::from_slice(payload)?)
    }
}

/// A row from the notification table.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyRow {
    /// The user the notification is addressed to; directory lookup key.
    pub nt_uid: u64,
    /// The user whose action produced the notification.
    pub nt_from_uid: u64,
    /// Read/unread status flag.
    #[serde(default)]
    pub nt_status: i32,
    /// The notification kind; indexes the static config table.
    pub nt_type: u32,
    /// Reference into the notification field table (title, subject id).
    pub nt_mid: u64,
    /// Anchor target (post id); zero when there is none.
    #[serde(default)]
    pub nt_related_id: u64,
    /// Event time, unix seconds.
    #[serde(rename = "nt_dateline")]
    pub dateline: i64,
}

/// A row from the direct-message table.
#[derive(Debug, Clone, Deserialize)]
pub struct PmRow {
    /// Message id.
    #[serde(default)]
    pub msg_id: u64,
    /// Sender user id.
    pub msg_sid: u64,
    /// Receiver user id.
    pub msg_rid: u64,
    /// Non-zero while the message is unread.
    #[serde(default)]
    pub msg_new: i32,
    /// Message subject.
    #[serde(default)]
    pub msg_title: String,
    /// Event time, unix seconds.
    #[serde(rename = "msg_dateline", default)]
    pub dateline: i64,
}
