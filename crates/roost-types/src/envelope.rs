use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, PeerSummary};

/// Events pushed to a client over its live connection.
///
/// Wire format is `{"type": <tag>, "payload": <tag-specific>}`; the tags are
/// part of the client protocol and include spaces, hence the renames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Envelope {
    /// A chat message, live-pushed at send time
    #[serde(rename = "Message")]
    Message(ChatMessage),

    /// Someone sent the client a friend request
    #[serde(rename = "Friend Request")]
    FriendRequest(PeerSummary),

    /// A request the client sent was accepted
    #[serde(rename = "Friend Accept")]
    FriendAccept(PeerSummary),

    /// A friend (or pending request) was removed by the named peer
    #[serde(rename = "Friend Delete")]
    FriendDelete(String),

    /// A friend signed in
    #[serde(rename = "Online Alert")]
    OnlineAlert(String),

    /// A friend's connection closed
    #[serde(rename = "Offline Alert")]
    OfflineAlert(String),
}

/// Inbound frame from a client: a chat message to route. The sender is never
/// taken from the frame; it is the authenticated identity of the connection.
#[derive(Debug, Clone, Deserialize)]
pub struct OutboundChat {
    pub receiver: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_tags_match_wire_protocol() {
        let env = Envelope::FriendRequest(PeerSummary {
            username: "ada".into(),
            avatar: 1,
        });
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&env).unwrap()).unwrap();
        assert_eq!(json["type"], "Friend Request");
        assert_eq!(json["payload"]["username"], "ada");

        let env = Envelope::OfflineAlert("ada".into());
        let json: serde_json::Value = serde_json::from_str(&serde_json::to_string(&env).unwrap()).unwrap();
        assert_eq!(json["type"], "Offline Alert");
        assert_eq!(json["payload"], "ada");
    }

    #[test]
    fn message_envelope_round_trips() {
        let env = Envelope::Message(ChatMessage {
            sender: "ada".into(),
            receiver: "alan".into(),
            content: "hello".into(),
            delivered: true,
        });
        let text = serde_json::to_string(&env).unwrap();
        assert_eq!(serde_json::from_str::<Envelope>(&text).unwrap(), env);
    }
}
