use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, PeerSummary};

// -- JWT Claims --

/// JWT claims shared by roost-api (REST middleware) and roost-server
/// (WebSocket upgrade). The canonical definition lives here so both layers
/// decode the same shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub avatar: i64,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Everything a client needs to resume: the undelivered backlog, the social
/// graph, and a fresh token.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub messages: Vec<ChatMessage>,
    pub requests: Vec<PeerSummary>,
    pub friends: Vec<PeerSummary>,
    pub token: String,
}

// -- Friends --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcceptFriendRequest {
    pub username: String,
    pub avatar: i64,
}

#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    pub target: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub search: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    pub avatar: i64,
}
