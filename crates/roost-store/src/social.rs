//! Friend/request graph: durable edge rows plus denormalized fast-store sets.
//!
//! Durable truth is one `friends` row per unordered pair. While
//! `accepted = 0` the row is a directed pending request (`user_a` asked
//! `user_b`); once accepted it is a symmetric friendship. The fast store
//! mirrors this as per-user friend and pending-request sets carrying each
//! peer's avatar so list reads skip the join.
//!
//! Every mutation is durable-first, mirror-second; every list read is
//! read-through. Mirror failures are logged and swallowed; the next
//! read-through repairs the sets from durable state.

use rusqlite::params;
use tracing::warn;

use roost_types::models::PeerSummary;

use crate::cache::SetKind;
use crate::error::is_unique_violation;
use crate::{Store, StoreError};

impl Store {
    /// Insert a pending request from `requester` to `target`.
    ///
    /// The unique pair index makes this the arbiter under concurrency: of two
    /// simultaneous calls for the same pair, exactly one row lands and the
    /// losing caller sees `AlreadyExists`, whichever direction it used.
    pub async fn create_request(
        &self,
        requester: &PeerSummary,
        target: &str,
    ) -> Result<(), StoreError> {
        let from = requester.username.clone();
        let to = target.to_string();
        self.durable(move |conn| {
            conn.execute(
                "INSERT INTO friends (user_a, user_b, accepted) VALUES (?1, ?2, 0)",
                params![from, to],
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyExists {
                        entity: "friend edge",
                        id: format!("{from}/{to}"),
                    }
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
        .await?;

        if let Err(e) = self
            .cache
            .insert_entry(SetKind::Requests, target, requester)
            .await
        {
            warn!("pending-set mirror write failed for {target}: {e}");
        }
        Ok(())
    }

    /// Flip the pending edge `requester -> acceptor` to an accepted
    /// friendship. Fails with `NotFound` when no such pending edge exists.
    pub async fn accept_request(
        &self,
        acceptor: &PeerSummary,
        requester: &PeerSummary,
    ) -> Result<(), StoreError> {
        let from = requester.username.clone();
        let to = acceptor.username.clone();
        self.durable(move |conn| {
            let updated = conn.execute(
                "UPDATE friends SET accepted = 1
                 WHERE user_a = ?1 AND user_b = ?2 AND accepted = 0",
                params![from, to],
            )?;
            if updated == 0 {
                return Err(StoreError::NotFound {
                    entity: "pending request",
                    id: format!("{from}/{to}"),
                });
            }
            Ok(())
        })
        .await?;

        if let Err(e) = self
            .cache
            .remove_entry(SetKind::Requests, &acceptor.username, &requester.username)
            .await
        {
            warn!("pending-set mirror cleanup failed for {}: {e}", acceptor.username);
        }
        if let Err(e) = self
            .cache
            .insert_entry(SetKind::Friends, &acceptor.username, requester)
            .await
        {
            warn!("friend-set mirror write failed for {}: {e}", acceptor.username);
        }
        if let Err(e) = self
            .cache
            .insert_entry(SetKind::Friends, &requester.username, acceptor)
            .await
        {
            warn!("friend-set mirror write failed for {}: {e}", requester.username);
        }
        Ok(())
    }

    /// Delete any edge (pending or accepted) between `a` and `b`.
    ///
    /// Idempotent: deleting a pair with no edge is a durable no-op. The
    /// caller does not know the edge's direction or state, so both directions
    /// of both cached sets are cleared for both identities regardless.
    pub async fn delete_edge(&self, a: &str, b: &str) -> Result<(), StoreError> {
        let (one, two) = (a.to_string(), b.to_string());
        self.durable(move |conn| {
            conn.execute(
                "DELETE FROM friends
                 WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)",
                params![one, two],
            )?;
            Ok(())
        })
        .await?;

        for (kind, owner, peer) in [
            (SetKind::Requests, a, b),
            (SetKind::Requests, b, a),
            (SetKind::Friends, a, b),
            (SetKind::Friends, b, a),
        ] {
            if let Err(e) = self.cache.remove_entry(kind, owner, peer).await {
                warn!("mirror cleanup failed for {owner}: {e}");
            }
        }
        Ok(())
    }

    /// Does any edge or pending request exist between `a` and `b`?
    ///
    /// Cached sets are probed first in both directions; only a positive hit
    /// short-circuits. On a complete miss the durable pair query decides.
    pub async fn exists_edge_or_request(&self, a: &str, b: &str) -> Result<bool, StoreError> {
        for (kind, owner, peer) in [
            (SetKind::Friends, a, b),
            (SetKind::Friends, b, a),
            (SetKind::Requests, a, b),
            (SetKind::Requests, b, a),
        ] {
            match self.cache.set_contains(kind, owner, peer).await {
                Ok(true) => return Ok(true),
                Ok(false) => {}
                Err(e) => warn!("fast store probe failed, degrading to durable: {e}"),
            }
        }

        let (one, two) = (a.to_string(), b.to_string());
        self.durable(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM friends
                 WHERE (user_a = ?1 AND user_b = ?2) OR (user_a = ?2 AND user_b = ?1)",
                params![one, two],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    /// Accepted friends of `identity`, with avatars.
    pub async fn list_friends(&self, identity: &str) -> Result<Vec<PeerSummary>, StoreError> {
        self.list_set(SetKind::Friends, identity, true).await
    }

    /// Pending requests involving `identity`, with avatars.
    pub async fn list_pending_requests(
        &self,
        identity: &str,
    ) -> Result<Vec<PeerSummary>, StoreError> {
        self.list_set(SetKind::Requests, identity, false).await
    }

    /// Read-through list: cached set when populated, else reconstruct from
    /// the durable store and write the result (even an empty one) back.
    async fn list_set(
        &self,
        kind: SetKind,
        identity: &str,
        accepted: bool,
    ) -> Result<Vec<PeerSummary>, StoreError> {
        let cache_ok = match self.cache.get_set(kind, identity).await {
            Ok(Some(peers)) => return Ok(peers),
            Ok(None) => true,
            Err(e) => {
                warn!("fast store read failed, degrading to durable: {e}");
                false
            }
        };

        let who = identity.to_string();
        let peers = self
            .durable(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT u.username, u.avatar
                     FROM users u
                     JOIN friends f ON u.username = CASE
                         WHEN f.user_a = ?1 THEN f.user_b
                         WHEN f.user_b = ?1 THEN f.user_a
                     END
                     WHERE f.accepted = ?2
                     ORDER BY u.username",
                )?;
                let peers = stmt
                    .query_map(params![who, accepted], |row| {
                        Ok(PeerSummary {
                            username: row.get(0)?,
                            avatar: row.get(1)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(peers)
            })
            .await?;

        if cache_ok {
            if let Err(e) = self.cache.put_set(kind, identity, &peers).await {
                warn!("set write-back failed for {identity}: {e}");
            }
        }
        Ok(peers)
    }
}

#[cfg(test)]
mod tests {
    use roost_types::models::PeerSummary;

    use crate::cache::{FastStore, SetKind};
    use crate::testutil::{store_with_cache, store_without_cache};
    use crate::{Store, StoreError};

    fn peer(username: &str, avatar: i64) -> PeerSummary {
        PeerSummary {
            username: username.into(),
            avatar,
        }
    }

    async fn seed_users(store: &Store, names: &[&str]) {
        for (i, name) in names.iter().enumerate() {
            store.create_user(name, i as i64 + 1, "h4sh").await.unwrap();
        }
    }

    #[tokio::test]
    async fn request_is_visible_from_both_sides() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();

        assert!(store.exists_edge_or_request("ada", "alan").await.unwrap());
        assert!(store.exists_edge_or_request("alan", "ada").await.unwrap());
    }

    #[tokio::test]
    async fn duplicate_request_fails_either_direction() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();

        let err = store.create_request(&peer("ada", 1), "alan").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        // The reverse direction is the same unordered pair
        let err = store.create_request(&peer("alan", 2), "ada").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn accept_makes_friendship_symmetric() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();
        assert_eq!(
            store.list_pending_requests("alan").await.unwrap(),
            vec![peer("ada", 1)]
        );

        store
            .accept_request(&peer("alan", 2), &peer("ada", 1))
            .await
            .unwrap();

        assert_eq!(store.list_friends("ada").await.unwrap(), vec![peer("alan", 2)]);
        assert_eq!(store.list_friends("alan").await.unwrap(), vec![peer("ada", 1)]);
        assert!(store.list_pending_requests("alan").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn accept_without_pending_edge_is_not_found() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        let err = store
            .accept_request(&peer("alan", 2), &peer("ada", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn accept_only_matches_the_requested_direction() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();

        // ada requested alan; ada cannot accept her own request
        let err = store
            .accept_request(&peer("ada", 1), &peer("alan", 2))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();
        store
            .accept_request(&peer("alan", 2), &peer("ada", 1))
            .await
            .unwrap();

        store.delete_edge("ada", "alan").await.unwrap();
        store.delete_edge("ada", "alan").await.unwrap();

        assert!(!store.exists_edge_or_request("ada", "alan").await.unwrap());
        assert!(store.list_friends("ada").await.unwrap().is_empty());
        assert!(store.list_friends("alan").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleared_friend_set_is_rebuilt_from_durable() {
        let (store, cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan", "grace"]).await;

        for other in ["alan", "grace"] {
            store.create_request(&peer("ada", 1), other).await.unwrap();
        }
        store
            .accept_request(&peer("alan", 2), &peer("ada", 1))
            .await
            .unwrap();
        store
            .accept_request(&peer("grace", 3), &peer("ada", 1))
            .await
            .unwrap();

        // Simulate fast-store loss for ada only; durable edges stay intact
        cache.invalidate_set(SetKind::Friends, "ada").await.unwrap();

        let friends = store.list_friends("ada").await.unwrap();
        assert_eq!(friends, vec![peer("alan", 2), peer("grace", 3)]);

        // The read repopulated the fast store as a side effect
        assert_eq!(
            cache.get_set(SetKind::Friends, "ada").await.unwrap(),
            Some(friends)
        );
    }

    #[tokio::test]
    async fn truly_empty_list_is_cached_as_populated() {
        let (store, cache) = store_with_cache().await;
        seed_users(&store, &["ada"]).await;

        assert!(store.list_friends("ada").await.unwrap().is_empty());
        assert_eq!(
            cache.get_set(SetKind::Friends, "ada").await.unwrap(),
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn concurrent_requests_for_one_pair_have_one_winner() {
        let (store, _cache) = store_with_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        let s1 = store.clone();
        let s2 = store.clone();
        let first = tokio::spawn(async move { s1.create_request(&peer("ada", 1), "alan").await });
        let second = tokio::spawn(async move { s2.create_request(&peer("alan", 2), "ada").await });

        let outcomes = [first.await.unwrap(), second.await.unwrap()];
        let wins = outcomes.iter().filter(|r| r.is_ok()).count();
        let dupes = outcomes
            .iter()
            .filter(|r| matches!(r, Err(StoreError::AlreadyExists { .. })))
            .count();
        assert_eq!((wins, dupes), (1, 1));

        // Exactly one durable row survived
        let count = store
            .durable(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM friends", [], |row| row.get::<_, i64>(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn social_graph_works_without_fast_store() {
        let store = store_without_cache().await;
        seed_users(&store, &["ada", "alan"]).await;

        store.create_request(&peer("ada", 1), "alan").await.unwrap();
        assert!(store.exists_edge_or_request("alan", "ada").await.unwrap());

        store
            .accept_request(&peer("alan", 2), &peer("ada", 1))
            .await
            .unwrap();
        assert_eq!(store.list_friends("ada").await.unwrap(), vec![peer("alan", 2)]);

        store.delete_edge("alan", "ada").await.unwrap();
        assert!(!store.exists_edge_or_request("ada", "alan").await.unwrap());
    }
}
