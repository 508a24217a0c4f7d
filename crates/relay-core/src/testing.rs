//! Test doubles for the external collaborator traits.
//!
//! In-memory implementations of [`SubscriberStore`], [`EnrichmentStore`]
//! and [`NotificationTransport`] with knobs for injecting failures and
//! latency. Used by the unit tests throughout this crate and by the
//! pipeline integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::dispatch::{FormatHint, OutboundItem};
use crate::error::RelayError;
use crate::event::RawEvent;
use crate::ingest::BlockingStreamSource;
use crate::store::{
    ActorProfile, EnrichmentStore, FieldInfo, NotificationTransport, SubscriberStore, Subscription,
};

/// Stream source that replays a fixed record sequence, then idles.
#[derive(Debug)]
pub struct ScriptedSource {
    records: std::collections::VecDeque<RawEvent>,
}

impl ScriptedSource {
    /// Creates a source over the given records.
    #[must_use]
    pub fn new(records: Vec<RawEvent>) -> Self {
        Self {
            records: records.into(),
        }
    }
}

impl BlockingStreamSource for ScriptedSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<RawEvent>, RelayError> {
        match self.records.pop_front() {
            Some(event) => Ok(Some(event)),
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }
}

/// In-memory subscriber store.
#[derive(Debug, Default)]
pub struct MockSubscriberStore {
    links: Mutex<Vec<Subscription>>,
    failing: bool,
}

impl MockSubscriberStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with active `(owner_id, chat_id)`
    /// links.
    #[must_use]
    pub fn with_links(links: &[(u64, i64)]) -> Self {
        let store = Self::new();
        {
            let mut guard = store.links.lock();
            for &(owner_id, chat_id) in links {
                guard.push(Subscription {
                    owner_id,
                    chat_id,
                    active: true,
                });
            }
        }
        store
    }

    /// Creates a store whose every operation fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            links: Mutex::new(Vec::new()),
            failing: true,
        }
    }

    fn check(&self) -> Result<(), RelayError> {
        if self.failing {
            Err(RelayError::Store("mock store failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubscriberStore for MockSubscriberStore {
    async fn list_active(&self) -> Result<Vec<(u64, i64)>, RelayError> {
        self.check()?;
        Ok(self
            .links
            .lock()
            .iter()
            .filter(|s| s.active)
            .map(|s| (s.owner_id, s.chat_id))
            .collect())
    }

    async fn get_subscription(&self, chat_id: i64) -> Result<Option<Subscription>, RelayError> {
        self.check()?;
        Ok(self.links.lock().iter().find(|s| s.chat_id == chat_id).copied())
    }

    async fn upsert(&self, chat_id: i64, owner_id: u64) -> Result<(), RelayError> {
        self.check()?;
        let mut links = self.links.lock();
        if let Some(existing) = links.iter_mut().find(|s| s.chat_id == chat_id) {
            existing.owner_id = owner_id;
            existing.active = true;
        } else {
            links.push(Subscription {
                owner_id,
                chat_id,
                active: true,
            });
        }
        Ok(())
    }

    async fn deactivate(&self, chat_id: i64) -> Result<(), RelayError> {
        self.check()?;
        for link in self.links.lock().iter_mut() {
            if link.chat_id == chat_id {
                link.active = false;
            }
        }
        Ok(())
    }
}

/// In-memory enrichment store with a lookup counter for cache tests.
#[derive(Debug, Default)]
pub struct MockEnrichmentStore {
    fields: Mutex<HashMap<u64, FieldInfo>>,
    actors: Mutex<HashMap<u64, ActorProfile>>,
    blocklists: Mutex<HashMap<u64, HashSet<u64>>>,
    actor_lookups: AtomicU64,
}

impl MockEnrichmentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a notification field.
    pub fn put_field(&self, field_ref: u64, rid: u64, title: &str) {
        self.fields.lock().insert(
            field_ref,
            FieldInfo {
                rid,
                title: title.to_string(),
                hash: 0,
            },
        );
    }

    /// Registers an actor profile.
    pub fn put_actor(&self, actor_id: u64, username: &str, nickname: &str) {
        self.actors.lock().insert(
            actor_id,
            ActorProfile {
                username: username.to_string(),
                nickname: nickname.to_string(),
            },
        );
    }

    /// Adds `blocked_id` to `user_id`'s block-list.
    pub fn put_blocklist(&self, user_id: u64, blocked_id: u64) {
        self.blocklists
            .lock()
            .entry(user_id)
            .or_default()
            .insert(blocked_id);
    }

    /// Number of actor lookups that reached this store.
    #[must_use]
    pub fn actor_lookups(&self) -> u64 {
        self.actor_lookups.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl EnrichmentStore for MockEnrichmentStore {
    async fn resolve_field(&self, field_ref: u64) -> Result<FieldInfo, RelayError> {
        self.fields
            .lock()
            .get(&field_ref)
            .cloned()
            .ok_or_else(|| RelayError::Lookup(format!("unknown field {field_ref}")))
    }

    async fn resolve_actor(&self, actor_id: u64) -> Result<ActorProfile, RelayError> {
        self.actor_lookups.fetch_add(1, Ordering::Relaxed);
        self.actors
            .lock()
            .get(&actor_id)
            .cloned()
            .ok_or_else(|| RelayError::Lookup(format!("unknown actor {actor_id}")))
    }

    async fn resolve_blocklist(&self, user_id: u64) -> Result<HashSet<u64>, RelayError> {
        Ok(self.blocklists.lock().get(&user_id).cloned().unwrap_or_default())
    }
}

/// Transport that records sends and can fail or delay on demand.
#[derive(Debug, Default)]
pub struct MockTransport {
    sent: Mutex<Vec<OutboundItem>>,
    failing_chats: Mutex<HashSet<i64>>,
    delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a transport that accepts everything instantly.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sends to `chat_id` fail.
    pub fn fail_chat(&self, chat_id: i64) {
        self.failing_chats.lock().insert(chat_id);
    }

    /// Delays every send by `delay`, to exercise backpressure.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// All successfully delivered items, in send order.
    #[must_use]
    pub fn sent(&self) -> Vec<OutboundItem> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl NotificationTransport for MockTransport {
    async fn send(&self, chat_id: i64, text: &str, hint: FormatHint) -> Result<(), RelayError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_chats.lock().contains(&chat_id) {
            return Err(RelayError::Transport(format!("chat {chat_id} rejected")));
        }

        self.sent.lock().push(OutboundItem {
            chat_id,
            text: text.to_string(),
            hint,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_store_lifecycle() {
        let store = MockSubscriberStore::new();
        store.upsert(100, 1).await.unwrap();
        store.upsert(200, 2).await.unwrap();
        assert_eq!(store.list_active().await.unwrap().len(), 2);

        store.deactivate(100).await.unwrap();
        let active = store.list_active().await.unwrap();
        assert_eq!(active, vec![(2, 200)]);

        let sub = store.get_subscription(100).await.unwrap().unwrap();
        assert!(!sub.active);
        assert_eq!(sub.owner_id, 1);
    }

    #[tokio::test]
    async fn test_upsert_reactivates() {
        let store = MockSubscriberStore::with_links(&[(1, 100)]);
        store.deactivate(100).await.unwrap();
        store.upsert(100, 9).await.unwrap();

        let sub = store.get_subscription(100).await.unwrap().unwrap();
        assert!(sub.active);
        assert_eq!(sub.owner_id, 9);
    }

    #[tokio::test]
    async fn test_enrichment_store_lookups() {
        let store = MockEnrichmentStore::new();
        store.put_field(6714, 42, "Test Topic");
        store.put_blocklist(100, 7);

        let field = store.resolve_field(6714).await.unwrap();
        assert_eq!(field.rid, 42);
        assert_eq!(field.title, "Test Topic");
        assert!(store.resolve_field(1).await.is_err());

        let blocked = store.resolve_blocklist(100).await.unwrap();
        assert!(blocked.contains(&7));
        assert!(store.resolve_blocklist(999).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transport_records_and_fails() {
        let transport = MockTransport::new();
        transport.fail_chat(2);

        transport.send(1, "a", FormatHint::Html).await.unwrap();
        assert!(transport.send(2, "b", FormatHint::Plain).await.is_err());

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chat_id, 1);
        assert_eq!(sent[0].hint, FormatHint::Html);
    }
}
