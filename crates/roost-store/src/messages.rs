//! Durable append-only message log plus the per-receiver fast pending queue.

use rusqlite::params;
use tracing::warn;

use roost_types::models::ChatMessage;

use crate::cache::QueuedMessage;
use crate::{Store, StoreError};

impl Store {
    /// Append a message to the durable log. The `delivered` flag was decided
    /// by the caller from the receiver's presence at send time; undelivered
    /// messages are additionally mirrored into the receiver's fast pending
    /// queue under its row id.
    pub async fn append(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let row = message.clone();
        let id = self
            .durable(move |conn| {
                conn.execute(
                    "INSERT INTO messages (sender, receiver, content, delivered)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![row.sender, row.receiver, row.content, row.delivered],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await?;

        if !message.delivered {
            let entry = QueuedMessage {
                id,
                message: message.clone(),
            };
            if let Err(e) = self.cache.push_pending(&message.receiver, &entry).await {
                warn!("pending-queue mirror write failed for {}: {e}", message.receiver);
            }
        }
        Ok(())
    }

    /// Read-through, non-destructive view of the undelivered backlog for
    /// `identity`: the fast queue when retrievable, otherwise the durable
    /// rows with `delivered = 0`, written back to the fast queue. Each entry
    /// carries its durable row id so the caller can acknowledge exactly what
    /// it drained.
    pub async fn drain_pending(&self, identity: &str) -> Result<Vec<QueuedMessage>, StoreError> {
        let cache_ok = match self.cache.pending(identity).await {
            Ok(Some(messages)) => return Ok(messages),
            Ok(None) => true,
            Err(e) => {
                warn!("fast store read failed, degrading to durable: {e}");
                false
            }
        };

        let who = identity.to_string();
        let messages = self
            .durable(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, sender, receiver, content, delivered FROM messages
                     WHERE receiver = ?1 AND delivered = 0
                     ORDER BY id",
                )?;
                let messages = stmt
                    .query_map([&who], |row| {
                        Ok(QueuedMessage {
                            id: row.get(0)?,
                            message: ChatMessage {
                                sender: row.get(1)?,
                                receiver: row.get(2)?,
                                content: row.get(3)?,
                                delivered: row.get(4)?,
                            },
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(messages)
            })
            .await?;

        if cache_ok {
            if let Err(e) = self.cache.put_pending(identity, &messages).await {
                warn!("pending-queue write-back failed for {identity}: {e}");
            }
        }
        Ok(messages)
    }

    /// Acknowledge a drained backlog: mark the durable rows up to and
    /// including `through` delivered and drop the fast queue. Rows appended
    /// after the drain have higher ids and stay undelivered; the dropped
    /// queue is rebuilt from durable on the next drain. Owned by the session
    /// layer; never called from the append/drain paths.
    pub async fn acknowledge_pending(
        &self,
        identity: &str,
        through: i64,
    ) -> Result<(), StoreError> {
        let who = identity.to_string();
        self.durable(move |conn| {
            conn.execute(
                "UPDATE messages SET delivered = 1
                 WHERE receiver = ?1 AND delivered = 0 AND id <= ?2",
                params![who, through],
            )?;
            Ok(())
        })
        .await?;

        if let Err(e) = self.cache.clear_pending(identity).await {
            warn!("pending-queue cleanup failed for {identity}: {e}");
        }
        Ok(())
    }
}
