use serde::{Deserialize, Serialize};

/// Public view of a user: what peers see in friend lists, pending-request
/// lists and search results. Never carries the credential hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerSummary {
    pub username: String,
    pub avatar: i64,
}

/// A chat message as it travels over the wire and into the durable log.
/// `delivered` is decided once, at the instant of send, from the receiver's
/// presence at that moment. It is never recomputed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: String,
    pub receiver: String,
    pub content: String,
    pub delivered: bool,
}
