//! Bounded dispatch queue, outbound items, and the sender loop.
//!
//! A single bounded mpsc channel sits between the formatting stage and
//! delivery. Producers await when it is full, which is the pipeline's
//! only deliberate backpressure point: a slow transport slows ingestion
//! instead of growing an unbounded in-memory buffer.
//!
//! Items are not persisted; loss on crash is accepted.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::store::NotificationTransport;

/// How the transport should render the message body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatHint {
    /// Plain text; any markup must be shown literally.
    Plain,
    /// The body contains HTML spans that must render.
    Html,
}

/// One formatted message addressed to one chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundItem {
    /// Destination chat.
    pub chat_id: i64,
    /// Rendered message body.
    pub text: String,
    /// Rendering hint for the transport.
    pub hint: FormatHint,
}

/// Creates the bounded dispatch channel.
///
/// Capacity below 1 is clamped to 1.
#[must_use]
pub fn channel(capacity: usize) -> (mpsc::Sender<OutboundItem>, mpsc::Receiver<OutboundItem>) {
    mpsc::channel(capacity.max(1))
}

/// Spawns the single sender loop.
///
/// The loop drains the queue and calls the transport once per item.
/// A delivery failure is logged and never terminates the loop or
/// affects sibling items; the loop ends when every sender handle has
/// been dropped.
pub fn spawn_sender(
    mut rx: mpsc::Receiver<OutboundItem>,
    transport: Arc<dyn NotificationTransport>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            match transport.send(item.chat_id, &item.text, item.hint).await {
                Ok(()) => debug!(chat_id = item.chat_id, "message delivered"),
                Err(e) => error!(chat_id = item.chat_id, error = %e, "failed to send message to chat"),
            }
        }
        info!("dispatch sender loop drained");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockTransport;

    #[tokio::test]
    async fn test_sender_drains_queue() {
        let transport = Arc::new(MockTransport::new());
        let (tx, rx) = channel(1);
        let handle = spawn_sender(rx, transport.clone());

        for chat_id in [1_i64, 2, 3] {
            tx.send(OutboundItem {
                chat_id,
                text: "hi".into(),
                hint: FormatHint::Plain,
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].chat_id, 1);
        assert_eq!(sent[2].chat_id, 3);
    }

    #[tokio::test]
    async fn test_sender_survives_delivery_failure() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_chat(2);

        let (tx, rx) = channel(1);
        let handle = spawn_sender(rx, transport.clone());

        for chat_id in [1_i64, 2, 3] {
            tx.send(OutboundItem {
                chat_id,
                text: "hi".into(),
                hint: FormatHint::Plain,
            })
            .await
            .unwrap();
        }
        drop(tx);
        handle.await.unwrap();

        // Chat 2 failed but 1 and 3 were still delivered.
        let sent = transport.sent();
        assert_eq!(sent.iter().map(|i| i.chat_id).collect::<Vec<_>>(), vec![1, 3]);
    }

    #[tokio::test]
    async fn test_capacity_clamped_to_one() {
        let (tx, mut rx) = channel(0);
        tx.send(OutboundItem {
            chat_id: 1,
            text: String::new(),
            hint: FormatHint::Plain,
        })
        .await
        .unwrap();
        assert!(rx.recv().await.is_some());
    }
}
