//! External store traits and their record types.
//!
//! The pipeline reaches out to two stores and one transport, all
//! specified here as traits so the pipeline can be exercised against
//! in-memory doubles (see [`crate::testing`]):
//!
//! - [`SubscriberStore`] — the persistent chat/user link table backing
//!   the in-memory directory.
//! - [`EnrichmentStore`] — point lookups for display data (titles,
//!   names, block-lists).
//! - [`NotificationTransport`] — the outbound delivery channel.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::dispatch::FormatHint;
use crate::error::RelayError;

/// One active subscription link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    /// The watched user.
    pub owner_id: u64,
    /// The chat notifications are delivered to.
    pub chat_id: i64,
    /// Whether the link is active.
    pub active: bool,
}

/// Resolved notification field data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// The subject id the notification URL points at.
    pub rid: u64,
    /// Display title of the thread/topic/entry.
    pub title: String,
    /// Merge-grouping hash carried from the source table.
    pub hash: u32,
}

/// Resolved actor display data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorProfile {
    /// Login name.
    pub username: String,
    /// Display name.
    pub nickname: String,
}

/// The persistent subscriber link table.
///
/// `list_active` feeds directory reloads; the remaining operations are
/// used by the external login/logout flow that maintains the table.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Returns every active `(owner_id, chat_id)` link.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the store is unreachable.
    async fn list_active(&self) -> Result<Vec<(u64, i64)>, RelayError>;

    /// Looks up the link for one chat, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the store is unreachable.
    async fn get_subscription(&self, chat_id: i64) -> Result<Option<Subscription>, RelayError>;

    /// Inserts or reactivates a link.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the write fails.
    async fn upsert(&self, chat_id: i64, owner_id: u64) -> Result<(), RelayError>;

    /// Deactivates all links for a chat.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the write fails.
    async fn deactivate(&self, chat_id: i64) -> Result<(), RelayError>;
}

/// Point lookups for notification display data.
///
/// All lookups reflect the store at the time of the call and may be
/// briefly stale when cached by the caller.
#[async_trait]
pub trait EnrichmentStore: Send + Sync {
    /// Resolves a notification field reference to its display data.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] if the store is unreachable or
    /// the reference does not exist.
    async fn resolve_field(&self, field_ref: u64) -> Result<FieldInfo, RelayError>;

    /// Resolves a user id to its display profile.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] if the store is unreachable or
    /// the user does not exist.
    async fn resolve_actor(&self, actor_id: u64) -> Result<ActorProfile, RelayError>;

    /// Returns the set of user ids a user has blocked.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Lookup`] if the store is unreachable.
    async fn resolve_blocklist(&self, user_id: u64) -> Result<HashSet<u64>, RelayError>;
}

/// The outbound delivery channel.
///
/// Rate limiting and retries are the transport's own concern; the
/// pipeline calls `send` once per outbound item and logs failures.
#[async_trait]
pub trait NotificationTransport: Send + Sync {
    /// Delivers one message to one chat.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Transport`] if delivery failed.
    async fn send(&self, chat_id: i64, text: &str, hint: FormatHint) -> Result<(), RelayError>;
}
