//! Connector error types.
//!
//! [`ConnectorError`] covers construction and connection of the
//! external systems. Steady-state operations go through the relay-core
//! trait signatures and their error types instead.

use thiserror::Error;

/// Errors raised while building or connecting a connector.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Failed to connect to the external system.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Invalid connector configuration.
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConnectorError::ConnectionFailed("broker unreachable".into());
        assert_eq!(err.to_string(), "connection failed: broker unreachable");
    }
}
