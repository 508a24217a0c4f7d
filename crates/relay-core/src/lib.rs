//! # Relay Core
//!
//! The change-event to push-notification pipeline: receives raw CDC
//! records from a stream source, decides which chats care, enriches
//! them with display data, formats a message, and hands it to an
//! outbound transport under bounded concurrency.
//!
//! ## Architecture
//!
//! ```text
//! poll thread (blocking Kafka poll)
//!   └─ EventRouter ──▶ notify queue ──▶ notify loop ─┐
//!                 └──▶ pm queue ─────▶ pm loop ──────┤
//!                                                    ▼
//!                          [directory lookup + enrichment + format]
//!                                                    ▼
//!                                  dispatch queue (bounded, cap 1)
//!                                                    ▼
//!                                  sender loop ──▶ transport
//! ```
//!
//! The dispatch queue is the single deliberate backpressure point: when
//! the transport is slow, formatting stalls, the event queues fill, and
//! the poll thread blocks on its handoff rather than buffering in memory.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(
    test,
    allow(
        clippy::field_reassign_with_default,
        clippy::unreadable_literal,
        clippy::cast_possible_truncation
    )
)]

/// Pipeline error types.
pub mod error;

/// Pipeline configuration knobs.
pub mod config;

/// Raw stream records and typed change events.
pub mod event;

/// Topic-based routing of raw records into typed queues.
pub mod router;

/// Blocking stream source trait and the dedicated poll thread.
pub mod ingest;

/// The owner → chats subscriber directory.
pub mod directory;

/// External store traits and their record types.
pub mod store;

/// Enrichment lookups with a bounded actor cache.
pub mod enrichment;

/// Static per-kind notification configuration table.
pub mod notify_types;

/// Pure notification text rendering.
pub mod formatter;

/// Bounded dispatch queue, outbound items, and the sender loop.
pub mod dispatch;

/// Pipeline orchestration: consumption loops and lifecycle.
pub mod pipeline;

/// Test doubles for the external collaborator traits.
pub mod testing;
