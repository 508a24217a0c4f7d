//! Kafka stream source.
//!
//! [`KafkaSource`] wraps an rdkafka `BaseConsumer` behind the
//! [`BlockingStreamSource`] trait, so the pipeline can drive it from
//! its dedicated poll thread. Offsets are auto-committed; the pipeline
//! tolerates redelivery, so at-least-once from the broker is enough.

use std::time::Duration;

use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::message::Message;
use rdkafka::ClientConfig;
use relay_core::error::RelayError;
use relay_core::event::RawEvent;
use relay_core::ingest::BlockingStreamSource;
use tracing::{debug, info};

use crate::error::ConnectorError;

/// Consumer configuration.
#[derive(Debug, Clone)]
pub struct KafkaSourceConfig {
    /// Broker bootstrap list, `host:port[,host:port]`.
    pub brokers: String,
    /// Consumer group id.
    pub group_id: String,
    /// Topics to subscribe to.
    pub topics: Vec<String>,
    /// Initial offset position for a new group, `latest` or `earliest`.
    pub offset_reset: String,
}

impl Default for KafkaSourceConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: "tg-notify-bot".to_string(),
            topics: Vec::new(),
            offset_reset: "latest".to_string(),
        }
    }
}

/// Blocking Kafka consumer over the Debezium topics.
pub struct KafkaSource {
    consumer: BaseConsumer,
    config: KafkaSourceConfig,
}

impl KafkaSource {
    /// Connects to the brokers and subscribes to the configured topics.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConfigurationError`] when no topic is
    /// configured or the client options are rejected, and
    /// [`ConnectorError::ConnectionFailed`] when subscription fails.
    pub fn connect(config: KafkaSourceConfig) -> Result<Self, ConnectorError> {
        if config.topics.is_empty() {
            return Err(ConnectorError::ConfigurationError(
                "at least one topic is required".to_string(),
            ));
        }

        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("auto.offset.reset", &config.offset_reset)
            .set("enable.auto.commit", "true")
            .create()
            .map_err(|e| ConnectorError::ConfigurationError(e.to_string()))?;

        let topics: Vec<&str> = config.topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&topics)
            .map_err(|e| ConnectorError::ConnectionFailed(e.to_string()))?;

        info!(
            brokers = %config.brokers,
            group = %config.group_id,
            topics = ?config.topics,
            "kafka consumer subscribed"
        );
        Ok(Self { consumer, config })
    }

    /// The consumer configuration in use.
    #[must_use]
    pub fn config(&self) -> &KafkaSourceConfig {
        &self.config
    }
}

impl BlockingStreamSource for KafkaSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<RawEvent>, RelayError> {
        let Some(message) = self.consumer.poll(timeout) else {
            return Ok(None);
        };
        let message = message.map_err(|e| RelayError::Source(e.to_string()))?;

        let Some(payload) = message.payload() else {
            // Tombstone or log-compaction marker.
            debug!(topic = message.topic(), "empty payload skipped");
            return Ok(None);
        };
        if payload.is_empty() {
            debug!(topic = message.topic(), "empty payload skipped");
            return Ok(None);
        }

        let offset = u64::try_from(message.offset()).unwrap_or(0);
        Ok(Some(RawEvent {
            stream_id: message.topic().to_string(),
            offset,
            key: message.key().map(<[u8]>::to_vec),
            value: payload.to_vec(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = KafkaSourceConfig::default();
        assert_eq!(cfg.group_id, "tg-notify-bot");
        assert_eq!(cfg.offset_reset, "latest");
        assert!(cfg.topics.is_empty());
    }

    #[test]
    fn test_connect_requires_topics() {
        let result = KafkaSource::connect(KafkaSourceConfig::default());
        assert!(matches!(
            result,
            Err(ConnectorError::ConfigurationError(_))
        ));
    }
}
