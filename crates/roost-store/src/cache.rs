//! The fast tier: ephemeral per-user mirrors of the durable store.
//!
//! Holds denormalized friend sets, pending-request sets, user records and
//! per-receiver pending-message queues, keyed by identity. Never a source of
//! truth: every value here is reconstructible from the durable store, and
//! every read-through path writes reconstructed values back.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use roost_types::models::{ChatMessage, PeerSummary};

use crate::rows::UserRow;

#[derive(Debug, Error)]
#[error("fast store unavailable: {0}")]
pub struct CacheError(pub String);

/// A pending-queue entry: the durable row id keys acknowledgement, the
/// message is what the client sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedMessage {
    pub id: i64,
    pub message: ChatMessage,
}

/// Which denormalized set a call addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetKind {
    /// Accepted friendships, mirrored into both users' sets
    Friends,
    /// Pending requests, mirrored into the target's set keyed by requester
    Requests,
}

/// The cache tier contract.
///
/// Set reads distinguish "never populated" (`None`, a miss that triggers
/// read-through) from "populated and genuinely empty" (`Some` of an empty
/// vec). Implementations may fail on any call; callers own the policy of
/// degrading reads to the durable store and swallowing mirror-write failures.
#[async_trait]
pub trait FastStore: Send + Sync {
    async fn get_user(&self, username: &str) -> Result<Option<UserRow>, CacheError>;
    async fn put_user(&self, user: &UserRow) -> Result<(), CacheError>;

    async fn get_set(
        &self,
        kind: SetKind,
        owner: &str,
    ) -> Result<Option<Vec<PeerSummary>>, CacheError>;

    /// Install a full reconstructed set, marking it populated even when empty.
    async fn put_set(
        &self,
        kind: SetKind,
        owner: &str,
        entries: &[PeerSummary],
    ) -> Result<(), CacheError>;

    /// Mirror a single entry into an already-populated set. A set that was
    /// never populated is left untouched: adding one entry to it would make a
    /// partial set look complete, and the next read-through rebuilds it in
    /// full anyway.
    async fn insert_entry(
        &self,
        kind: SetKind,
        owner: &str,
        entry: &PeerSummary,
    ) -> Result<(), CacheError>;

    async fn remove_entry(&self, kind: SetKind, owner: &str, peer: &str)
    -> Result<(), CacheError>;

    /// Membership probe; false covers both "absent" and "never populated".
    async fn set_contains(&self, kind: SetKind, owner: &str, peer: &str)
    -> Result<bool, CacheError>;

    /// Drop a set entirely, returning the key to the never-populated state.
    async fn invalidate_set(&self, kind: SetKind, owner: &str) -> Result<(), CacheError>;

    /// Mirror one entry onto an already-populated queue. A queue that was
    /// never populated is left untouched, same rule as `insert_entry`: one
    /// appended message must not make a partial backlog look complete.
    async fn push_pending(&self, receiver: &str, message: &QueuedMessage)
    -> Result<(), CacheError>;

    /// Install a full reconstructed pending queue.
    async fn put_pending(
        &self,
        receiver: &str,
        messages: &[QueuedMessage],
    ) -> Result<(), CacheError>;

    /// Non-destructive read of the pending queue; `None` when never populated.
    async fn pending(&self, receiver: &str) -> Result<Option<Vec<QueuedMessage>>, CacheError>;

    async fn clear_pending(&self, receiver: &str) -> Result<(), CacheError>;
}

#[derive(Default)]
struct MemoryCacheInner {
    users: HashMap<String, UserRow>,
    friends: HashMap<String, HashMap<String, i64>>,
    requests: HashMap<String, HashMap<String, i64>>,
    pending: HashMap<String, Vec<QueuedMessage>>,
}

impl MemoryCacheInner {
    fn sets(&self, kind: SetKind) -> &HashMap<String, HashMap<String, i64>> {
        match kind {
            SetKind::Friends => &self.friends,
            SetKind::Requests => &self.requests,
        }
    }

    fn sets_mut(&mut self, kind: SetKind) -> &mut HashMap<String, HashMap<String, i64>> {
        match kind {
            SetKind::Friends => &mut self.friends,
            SetKind::Requests => &mut self.requests,
        }
    }
}

/// In-process fast store. Empty at process start, lost at process exit.
#[derive(Default)]
pub struct MemoryCache {
    inner: RwLock<MemoryCacheInner>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FastStore for MemoryCache {
    async fn get_user(&self, username: &str) -> Result<Option<UserRow>, CacheError> {
        Ok(self.inner.read().await.users.get(username).cloned())
    }

    async fn put_user(&self, user: &UserRow) -> Result<(), CacheError> {
        self.inner
            .write()
            .await
            .users
            .insert(user.username.clone(), user.clone());
        Ok(())
    }

    async fn get_set(
        &self,
        kind: SetKind,
        owner: &str,
    ) -> Result<Option<Vec<PeerSummary>>, CacheError> {
        let inner = self.inner.read().await;
        let Some(entries) = inner.sets(kind).get(owner) else {
            return Ok(None);
        };
        let mut peers: Vec<PeerSummary> = entries
            .iter()
            .map(|(username, avatar)| PeerSummary {
                username: username.clone(),
                avatar: *avatar,
            })
            .collect();
        peers.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(Some(peers))
    }

    async fn put_set(
        &self,
        kind: SetKind,
        owner: &str,
        entries: &[PeerSummary],
    ) -> Result<(), CacheError> {
        let set = entries
            .iter()
            .map(|peer| (peer.username.clone(), peer.avatar))
            .collect();
        self.inner
            .write()
            .await
            .sets_mut(kind)
            .insert(owner.to_string(), set);
        Ok(())
    }

    async fn insert_entry(
        &self,
        kind: SetKind,
        owner: &str,
        entry: &PeerSummary,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if let Some(set) = inner.sets_mut(kind).get_mut(owner) {
            set.insert(entry.username.clone(), entry.avatar);
        }
        Ok(())
    }

    async fn remove_entry(
        &self,
        kind: SetKind,
        owner: &str,
        peer: &str,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if let Some(set) = inner.sets_mut(kind).get_mut(owner) {
            set.remove(peer);
        }
        Ok(())
    }

    async fn set_contains(
        &self,
        kind: SetKind,
        owner: &str,
        peer: &str,
    ) -> Result<bool, CacheError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sets(kind)
            .get(owner)
            .is_some_and(|set| set.contains_key(peer)))
    }

    async fn invalidate_set(&self, kind: SetKind, owner: &str) -> Result<(), CacheError> {
        self.inner.write().await.sets_mut(kind).remove(owner);
        Ok(())
    }

    async fn push_pending(
        &self,
        receiver: &str,
        message: &QueuedMessage,
    ) -> Result<(), CacheError> {
        let mut inner = self.inner.write().await;
        if let Some(queue) = inner.pending.get_mut(receiver) {
            queue.push(message.clone());
        }
        Ok(())
    }

    async fn put_pending(
        &self,
        receiver: &str,
        messages: &[QueuedMessage],
    ) -> Result<(), CacheError> {
        self.inner
            .write()
            .await
            .pending
            .insert(receiver.to_string(), messages.to_vec());
        Ok(())
    }

    async fn pending(&self, receiver: &str) -> Result<Option<Vec<QueuedMessage>>, CacheError> {
        Ok(self.inner.read().await.pending.get(receiver).cloned())
    }

    async fn clear_pending(&self, receiver: &str) -> Result<(), CacheError> {
        self.inner.write().await.pending.remove(receiver);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_set_is_distinct_from_unpopulated() {
        let cache = MemoryCache::new();

        assert_eq!(cache.get_set(SetKind::Friends, "ada").await.unwrap(), None);

        cache.put_set(SetKind::Friends, "ada", &[]).await.unwrap();
        assert_eq!(
            cache.get_set(SetKind::Friends, "ada").await.unwrap(),
            Some(vec![])
        );

        cache.invalidate_set(SetKind::Friends, "ada").await.unwrap();
        assert_eq!(cache.get_set(SetKind::Friends, "ada").await.unwrap(), None);
    }

    #[tokio::test]
    async fn insert_entry_skips_unpopulated_sets() {
        let cache = MemoryCache::new();
        let peer = PeerSummary {
            username: "alan".into(),
            avatar: 2,
        };

        // Never populated: a lone mirrored entry must not masquerade as the
        // full set.
        cache
            .insert_entry(SetKind::Friends, "ada", &peer)
            .await
            .unwrap();
        assert_eq!(cache.get_set(SetKind::Friends, "ada").await.unwrap(), None);

        // Populated: the entry lands.
        cache.put_set(SetKind::Friends, "ada", &[]).await.unwrap();
        cache
            .insert_entry(SetKind::Friends, "ada", &peer)
            .await
            .unwrap();
        assert!(
            cache
                .set_contains(SetKind::Friends, "ada", "alan")
                .await
                .unwrap()
        );
    }

    fn queued(id: i64, content: &str) -> QueuedMessage {
        QueuedMessage {
            id,
            message: ChatMessage {
                sender: "ada".into(),
                receiver: "alan".into(),
                content: content.into(),
                delivered: false,
            },
        }
    }

    #[tokio::test]
    async fn pending_read_is_non_destructive() {
        let cache = MemoryCache::new();
        let msg = queued(1, "hi");

        cache.put_pending("alan", &[msg.clone()]).await.unwrap();
        assert_eq!(cache.pending("alan").await.unwrap(), Some(vec![msg.clone()]));
        assert_eq!(cache.pending("alan").await.unwrap(), Some(vec![msg]));

        cache.clear_pending("alan").await.unwrap();
        assert_eq!(cache.pending("alan").await.unwrap(), None);
    }

    #[tokio::test]
    async fn push_pending_skips_unpopulated_queues() {
        let cache = MemoryCache::new();

        // Never populated: one pushed message must not masquerade as the
        // whole backlog.
        cache.push_pending("alan", &queued(1, "old")).await.unwrap();
        assert_eq!(cache.pending("alan").await.unwrap(), None);

        // Populated: the push appends.
        cache.put_pending("alan", &[queued(1, "old")]).await.unwrap();
        cache.push_pending("alan", &queued(2, "new")).await.unwrap();
        assert_eq!(
            cache.pending("alan").await.unwrap(),
            Some(vec![queued(1, "old"), queued(2, "new")])
        );
    }
}
