//! The owner → chats subscriber directory.
//!
//! An in-memory snapshot of the active subscription links, rebuilt
//! wholesale from the [`SubscriberStore`] and swapped atomically.
//! Readers always observe either the entire old or entire new mapping,
//! never a mix: the map lives behind an `Arc` that is replaced under a
//! short write-lock critical section, while `lookup` clones the `Arc`
//! under a read lock and walks the map outside it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::RelayError;
use crate::store::SubscriberStore;

type DirectoryMap = HashMap<u64, HashSet<i64>>;

/// Concurrently-read, wholesale-replaced subscriber directory.
///
/// Empty at construction; the pipeline must not consume events until
/// the first [`reload`](SubscriberDirectory::reload) has succeeded.
#[derive(Debug, Default)]
pub struct SubscriberDirectory {
    snapshot: RwLock<Arc<DirectoryMap>>,
}

impl SubscriberDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the chats subscribed to `owner_id`, or an empty set.
    #[must_use]
    pub fn lookup(&self, owner_id: u64) -> HashSet<i64> {
        let snapshot = Arc::clone(&self.snapshot.read());
        snapshot.get(&owner_id).cloned().unwrap_or_default()
    }

    /// Returns the number of owners with at least one subscribed chat.
    #[must_use]
    pub fn owner_count(&self) -> usize {
        self.snapshot.read().len()
    }

    /// Fetches the full active-subscription set and atomically swaps
    /// the snapshot.
    ///
    /// On failure the previous snapshot remains authoritative.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Store`] if the store read fails.
    pub async fn reload(&self, store: &dyn SubscriberStore) -> Result<(), RelayError> {
        let links = store.list_active().await?;

        let mut map: DirectoryMap = HashMap::new();
        for (owner_id, chat_id) in links {
            map.entry(owner_id).or_default().insert(chat_id);
        }

        let owners = map.len();
        *self.snapshot.write() = Arc::new(map);
        info!(owners, "subscriber directory reloaded");
        Ok(())
    }

    /// Replaces the snapshot directly. Intended for tests.
    pub fn replace(&self, map: HashMap<u64, HashSet<i64>>) {
        debug!(owners = map.len(), "subscriber directory replaced");
        *self.snapshot.write() = Arc::new(map);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSubscriberStore;

    #[tokio::test]
    async fn test_empty_directory_lookup() {
        let dir = SubscriberDirectory::new();
        assert!(dir.lookup(42).is_empty());
        assert_eq!(dir.owner_count(), 0);
    }

    #[tokio::test]
    async fn test_reload_groups_by_owner() {
        let store = MockSubscriberStore::with_links(&[(1, 100), (1, 101), (2, 200)]);
        let dir = SubscriberDirectory::new();

        dir.reload(&store).await.unwrap();

        assert_eq!(dir.owner_count(), 2);
        let chats = dir.lookup(1);
        assert_eq!(chats.len(), 2);
        assert!(chats.contains(&100));
        assert!(chats.contains(&101));
        assert_eq!(dir.lookup(2), HashSet::from([200]));
        assert!(dir.lookup(3).is_empty());
    }

    #[tokio::test]
    async fn test_reload_replaces_wholesale() {
        let dir = SubscriberDirectory::new();

        let store = MockSubscriberStore::with_links(&[(1, 100)]);
        dir.reload(&store).await.unwrap();
        assert!(!dir.lookup(1).is_empty());

        // Owner 1 dropped, owner 2 appears; the old entry must be gone.
        let store = MockSubscriberStore::with_links(&[(2, 200)]);
        dir.reload(&store).await.unwrap();
        assert!(dir.lookup(1).is_empty());
        assert_eq!(dir.lookup(2), HashSet::from([200]));
    }

    #[tokio::test]
    async fn test_failed_reload_keeps_old_snapshot() {
        let dir = SubscriberDirectory::new();

        let store = MockSubscriberStore::with_links(&[(1, 100)]);
        dir.reload(&store).await.unwrap();

        let broken = MockSubscriberStore::failing();
        assert!(dir.reload(&broken).await.is_err());
        assert_eq!(dir.lookup(1), HashSet::from([100]));
    }

    #[tokio::test]
    async fn test_concurrent_readers_during_reload() {
        let dir = Arc::new(SubscriberDirectory::new());
        let store = MockSubscriberStore::with_links(&[(7, 700)]);
        dir.reload(&store).await.unwrap();

        let mut readers = Vec::new();
        for _ in 0..8 {
            let dir = Arc::clone(&dir);
            readers.push(tokio::spawn(async move {
                for _ in 0..100 {
                    let chats = dir.lookup(7);
                    // Either the old or the new full set, never partial.
                    assert!(chats == HashSet::from([700]) || chats == HashSet::from([701]));
                }
            }));
        }

        let swapped = MockSubscriberStore::with_links(&[(7, 701)]);
        dir.reload(&swapped).await.unwrap();

        for r in readers {
            r.await.unwrap();
        }
    }
}
