//! # Relay Connectors
//!
//! Real-system implementations of the relay-core collaborator traits:
//!
//! - [`kafka::KafkaSource`] — blocking Debezium topic consumer
//! - [`postgres::PgSubscriberStore`] — subscription link table
//! - [`mysql::MySqlEnrichmentStore`] — titles, profiles, block-lists
//! - [`telegram::TelegramTransport`] — Bot API message delivery
//!
//! Construction and connection errors use [`error::ConnectorError`];
//! once wired into the pipeline, operations report through the
//! relay-core error types the traits prescribe.

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Connector error types.
pub mod error;

/// Kafka stream source.
pub mod kafka;

/// MySQL enrichment store.
pub mod mysql;

/// Postgres subscriber store.
pub mod postgres;

/// Telegram outbound transport.
pub mod telegram;
