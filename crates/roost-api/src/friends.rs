//! Friend-graph mutations. Each handler writes through the store and then
//! hands the affected peer's notification to the fan-out: pushed if they are
//! online, dropped if not.

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use roost_types::api::{AcceptFriendRequest, Claims, TargetQuery};
use roost_types::envelope::Envelope;
use roost_types::models::PeerSummary;

use crate::{AppState, status_for};

pub async fn request_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    if claims.sub == query.target {
        return Err(StatusCode::BAD_REQUEST);
    }

    // The target must exist; a typo should not create a dangling edge
    state.store.get_user(&query.target).await.map_err(status_for)?;

    let requester = PeerSummary {
        username: claims.sub,
        avatar: claims.avatar,
    };
    state
        .store
        .create_request(&requester, &query.target)
        .await
        .map_err(status_for)?;

    state
        .fanout
        .notify(&query.target, Envelope::FriendRequest(requester))
        .await;
    Ok(StatusCode::OK)
}

pub async fn accept_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(requester): Json<AcceptFriendRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let acceptor = PeerSummary {
        username: claims.sub,
        avatar: claims.avatar,
    };
    let requester = PeerSummary {
        username: requester.username,
        avatar: requester.avatar,
    };

    state
        .store
        .accept_request(&acceptor, &requester)
        .await
        .map_err(status_for)?;

    state
        .fanout
        .notify(&requester.username, Envelope::FriendAccept(acceptor))
        .await;
    Ok(StatusCode::OK)
}

pub async fn delete_friend(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<TargetQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .store
        .delete_edge(&claims.sub, &query.target)
        .await
        .map_err(status_for)?;

    state
        .fanout
        .notify(&query.target, Envelope::FriendDelete(claims.sub))
        .await;
    Ok(StatusCode::OK)
}
