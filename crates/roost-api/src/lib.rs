pub mod auth;
pub mod friends;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::http::StatusCode;
use tracing::error;

use roost_gateway::fanout::Fanout;
use roost_store::{Store, StoreError};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Store,
    pub fanout: Fanout,
    pub jwt_secret: String,
}

/// Map a store failure onto the HTTP surface. Unavailability and unexpected
/// database errors are both a 500 to the client; the distinction lives in
/// the logs.
pub(crate) fn status_for(err: StoreError) -> StatusCode {
    match err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::AlreadyExists { .. } => StatusCode::CONFLICT,
        other => {
            error!("store failure: {other}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
