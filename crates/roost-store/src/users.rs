//! User account rows, with a read-through mirror in the fast store.

use rusqlite::OptionalExtension;
use tracing::warn;

use crate::error::is_unique_violation;
use crate::rows::UserRow;
use crate::{Store, StoreError};

impl Store {
    /// Create a user. Fails with `AlreadyExists` when the username is taken.
    pub async fn create_user(
        &self,
        username: &str,
        avatar: i64,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let row = UserRow {
            username: username.to_string(),
            avatar,
            hash: password_hash.to_string(),
        };

        let insert = row.clone();
        self.durable(move |conn| {
            conn.execute(
                "INSERT INTO users (username, avatar, hash) VALUES (?1, ?2, ?3)",
                (&insert.username, insert.avatar, &insert.hash),
            )
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyExists {
                        entity: "user",
                        id: insert.username.clone(),
                    }
                } else {
                    e.into()
                }
            })?;
            Ok(())
        })
        .await?;

        if let Err(e) = self.cache.put_user(&row).await {
            warn!("user mirror write failed for {username}: {e}");
        }
        Ok(())
    }

    /// Change a user's avatar. The durable row is the source of truth; the
    /// user mirror is refreshed, while avatars denormalized into other
    /// users' cached sets stay stale until their next read-through.
    pub async fn update_avatar(&self, username: &str, avatar: i64) -> Result<(), StoreError> {
        let who = username.to_string();
        let row = self
            .durable(move |conn| {
                let updated = conn.execute(
                    "UPDATE users SET avatar = ?2 WHERE username = ?1",
                    (&who, avatar),
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "user",
                        id: who,
                    });
                }
                conn.query_row(
                    "SELECT username, avatar, hash FROM users WHERE username = ?1",
                    [&who],
                    |row| {
                        Ok(UserRow {
                            username: row.get(0)?,
                            avatar: row.get(1)?,
                            hash: row.get(2)?,
                        })
                    },
                )
                .map_err(Into::into)
            })
            .await?;

        if let Err(e) = self.cache.put_user(&row).await {
            warn!("user mirror write failed for {username}: {e}");
        }
        Ok(())
    }

    /// Read-through lookup of a user by exact username.
    pub async fn get_user(&self, username: &str) -> Result<UserRow, StoreError> {
        let cache_ok = match self.cache.get_user(username).await {
            Ok(Some(user)) => return Ok(user),
            Ok(None) => true,
            Err(e) => {
                warn!("fast store read failed, degrading to durable: {e}");
                false
            }
        };

        let who = username.to_string();
        let row = self
            .durable(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT username, avatar, hash FROM users WHERE username = ?1",
                        [&who],
                        |row| {
                            Ok(UserRow {
                                username: row.get(0)?,
                                avatar: row.get(1)?,
                                hash: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                row.ok_or(StoreError::NotFound {
                    entity: "user",
                    id: who,
                })
            })
            .await?;

        if cache_ok {
            if let Err(e) = self.cache.put_user(&row).await {
                warn!("user mirror write failed for {username}: {e}");
            }
        }
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use crate::cache::FastStore;
    use crate::testutil::{store_with_cache, store_without_cache};
    use crate::StoreError;

    #[tokio::test]
    async fn create_and_read_through() {
        let (store, cache) = store_with_cache().await;

        store.create_user("ada", 1, "h4sh").await.unwrap();

        // The mirror was written at create time
        let cached = cache.get_user("ada").await.unwrap().unwrap();
        assert_eq!(cached.avatar, 1);

        let user = store.get_user("ada").await.unwrap();
        assert_eq!(user.username, "ada");
        assert_eq!(user.hash, "h4sh");
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let (store, _cache) = store_with_cache().await;

        store.create_user("ada", 1, "h4sh").await.unwrap();
        let err = store.create_user("ada", 2, "0ther").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn avatar_update_refreshes_the_mirror() {
        let (store, cache) = store_with_cache().await;

        store.create_user("ada", 1, "h4sh").await.unwrap();
        store.update_avatar("ada", 4).await.unwrap();

        assert_eq!(store.get_user("ada").await.unwrap().avatar, 4);
        assert_eq!(cache.get_user("ada").await.unwrap().unwrap().avatar, 4);

        let err = store.update_avatar("nobody", 4).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn missing_user_is_not_found() {
        let (store, _cache) = store_with_cache().await;

        let err = store.get_user("nobody").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn unavailable_fast_store_degrades_to_durable() {
        let store = store_without_cache().await;

        // Mirror writes fail but are swallowed; the durable write decides.
        store.create_user("ada", 1, "h4sh").await.unwrap();
        let user = store.get_user("ada").await.unwrap();
        assert_eq!(user.username, "ada");
    }
}
