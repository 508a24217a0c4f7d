//! Telegram outbound transport.
//!
//! Implements [`NotificationTransport`] over the Bot API `sendMessage`
//! method. HTML-formatted bodies are sent with `parse_mode=HTML`; plain
//! bodies omit the field so markup-looking text stays literal.
//!
//! No retry or rate-limit handling here; a rejected send is reported
//! back and the pipeline logs it.

use std::time::Duration;

use async_trait::async_trait;
use relay_core::dispatch::FormatHint;
use relay_core::error::RelayError;
use relay_core::store::NotificationTransport;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConnectorError;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API message transport.
pub struct TelegramTransport {
    http: reqwest::Client,
    send_url: String,
}

impl TelegramTransport {
    /// Creates a transport for the given bot token.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectorError::ConfigurationError`] if the HTTP
    /// client cannot be built.
    pub fn new(token: &str) -> Result<Self, ConnectorError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ConnectorError::ConfigurationError(e.to_string()))?;

        Ok(Self {
            http,
            send_url: format!("{API_BASE}/bot{token}/sendMessage"),
        })
    }

    fn parse_mode(hint: FormatHint) -> Option<&'static str> {
        match hint {
            FormatHint::Html => Some("HTML"),
            FormatHint::Plain => None,
        }
    }
}

#[async_trait]
impl NotificationTransport for TelegramTransport {
    async fn send(&self, chat_id: i64, text: &str, hint: FormatHint) -> Result<(), RelayError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: Self::parse_mode(hint),
        };

        let response = self
            .http
            .post(&self.send_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RelayError::Transport(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Transport(format!("bad API reply ({status}): {e}")))?;

        if !body.ok {
            return Err(RelayError::Transport(
                body.description
                    .unwrap_or_else(|| format!("sendMessage failed with {status}")),
            ));
        }

        debug!(chat_id, "telegram message sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_request_payload() {
        let request = SendMessageRequest {
            chat_id: 100,
            text: "<b>hi</b>",
            parse_mode: TelegramTransport::parse_mode(FormatHint::Html),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["chat_id"], 100);
        assert_eq!(json["parse_mode"], "HTML");
    }

    #[test]
    fn test_plain_request_omits_parse_mode() {
        let request = SendMessageRequest {
            chat_id: 100,
            text: "hi",
            parse_mode: TelegramTransport::parse_mode(FormatHint::Plain),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("parse_mode").is_none());
    }

    #[test]
    fn test_api_error_reply_decodes() {
        let body: ApiResponse =
            serde_json::from_str(r#"{"ok": false, "description": "Bad Request"}"#).unwrap();
        assert!(!body.ok);
        assert_eq!(body.description.as_deref(), Some("Bad Request"));
    }
}
