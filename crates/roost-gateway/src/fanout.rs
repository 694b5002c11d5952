//! Delivery fan-out: live push versus durable queue, per recipient presence.

use tracing::warn;

use roost_store::{Store, StoreError};
use roost_types::envelope::{Envelope, OutboundChat};
use roost_types::models::ChatMessage;

use crate::presence::Presence;

#[derive(Clone)]
pub struct Fanout {
    presence: Presence,
    store: Store,
}

impl Fanout {
    pub fn new(presence: Presence, store: Store) -> Self {
        Self { presence, store }
    }

    pub fn presence(&self) -> &Presence {
        &self.presence
    }

    /// Route one chat message from the authenticated `sender`.
    ///
    /// The receiver's presence at this instant fixes the `delivered` flag for
    /// good. The durable append happens first and its failure propagates:
    /// a chat message is never silently lost. The live push follows for an
    /// online receiver; an offline one gets the message queued instead, to be
    /// drained at next sign-in.
    pub async fn send_chat(
        &self,
        sender: &str,
        chat: OutboundChat,
    ) -> Result<ChatMessage, StoreError> {
        let handle = self.presence.lookup(&chat.receiver).await;
        let message = ChatMessage {
            sender: sender.to_string(),
            receiver: chat.receiver,
            content: chat.content,
            delivered: handle.is_some(),
        };

        self.store.append(&message).await?;

        if let Some(handle) = handle {
            handle.push(Envelope::Message(message.clone()));
        }
        Ok(message)
    }

    /// Best-effort social notification: pushed when the peer is online,
    /// dropped otherwise. There is no durable retry path for these.
    pub async fn notify(&self, peer: &str, event: Envelope) {
        if let Some(handle) = self.presence.lookup(peer).await {
            handle.push(event);
        }
    }

    /// Alert every online friend of `identity` that it changed presence
    /// state. Best-effort end to end: an unavailable friend list only costs
    /// the alerts, never the operation that triggered them.
    pub async fn presence_changed(&self, identity: &str, online: bool) {
        let friends = match self.store.list_friends(identity).await {
            Ok(friends) => friends,
            Err(e) => {
                warn!("presence alerts for {identity} skipped, friend list unavailable: {e}");
                return;
            }
        };

        for friend in friends {
            let event = if online {
                Envelope::OnlineAlert(identity.to_string())
            } else {
                Envelope::OfflineAlert(identity.to_string())
            };
            self.notify(&friend.username, event).await;
        }
    }
}
