//! The presence registry: identity -> live-connection handle.
//!
//! One explicitly constructed instance is injected everywhere presence is
//! consulted; all mutations and lookups go through its single `RwLock`.
//! Nothing here is persisted; the table is empty at process start and a
//! lookup miss simply means the peer is offline.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use roost_types::envelope::Envelope;

/// Live-connection handle: the sending half of the connection's outbound
/// queue, tagged with a per-connection id so a stale disconnect can be told
/// apart from the current one.
#[derive(Clone)]
pub struct ClientHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<Envelope>,
}

impl ClientHandle {
    /// Queue an event for the connection's send loop. Infallible from the
    /// caller's side: a closed queue means the peer is already going away.
    pub fn push(&self, event: Envelope) {
        let _ = self.tx.send(event);
    }
}

#[derive(Clone, Default)]
pub struct Presence {
    inner: Arc<RwLock<HashMap<String, ClientHandle>>>,
}

impl Presence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a live handle for `identity`, creating its outbound queue.
    ///
    /// Re-registration closes-then-replaces: the previous handle is dropped
    /// here, which ends the orphaned connection's send loop and with it the
    /// old socket. Returns the connection id the owning task must present at
    /// unregister time, plus the receiving half of the outbound queue.
    pub async fn register(
        &self,
        identity: &str,
    ) -> (Uuid, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn_id = Uuid::new_v4();
        let replaced = self
            .inner
            .write()
            .await
            .insert(identity.to_string(), ClientHandle { conn_id, tx });
        if replaced.is_some() {
            debug!("{identity} re-registered, closing previous connection");
        }
        (conn_id, rx)
    }

    /// Remove the entry for `identity`, but only when `conn_id` still owns
    /// it: a connection that was replaced must not evict its successor.
    /// Returns whether this call removed the entry.
    pub async fn unregister(&self, identity: &str, conn_id: Uuid) -> bool {
        let mut table = self.inner.write().await;
        match table.get(identity) {
            Some(handle) if handle.conn_id == conn_id => {
                table.remove(identity);
                true
            }
            _ => false,
        }
    }

    /// Non-blocking presence lookup. `None` is a valid outcome (peer
    /// offline), never an error.
    pub async fn lookup(&self, identity: &str) -> Option<ClientHandle> {
        self.inner.read().await.get(identity).cloned()
    }
}
