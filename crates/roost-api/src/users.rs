use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};

use roost_types::api::{AvatarQuery, Claims, SearchQuery};
use roost_types::models::PeerSummary;

use crate::{AppState, status_for};

/// Exact-username lookup, returning only the public profile fields.
pub async fn search_user(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    let user = state.store.get_user(&query.search).await.map_err(status_for)?;
    Ok(Json(PeerSummary {
        username: user.username,
        avatar: user.avatar,
    }))
}

/// Change the caller's own avatar. Takes effect in peers' cached sets on
/// their next read-through; the token keeps its issue-time avatar until
/// refreshed at sign-in.
pub async fn update_avatar(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<AvatarQuery>,
) -> Result<impl IntoResponse, StatusCode> {
    state
        .store
        .update_avatar(&claims.sub, query.avatar)
        .await
        .map_err(status_for)?;
    Ok(StatusCode::OK)
}
