use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Extension, Router,
    extract::{State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use roost_api::middleware::require_auth;
use roost_api::{AppState, AppStateInner, auth, friends, users};
use roost_gateway::connection;
use roost_gateway::fanout::Fanout;
use roost_gateway::presence::Presence;
use roost_store::{Database, MemoryCache, Store};
use roost_types::api::Claims;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roost=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let jwt_secret =
        std::env::var("ROOST_JWT_SECRET").unwrap_or_else(|_| "dev-secret-change-me".into());
    let db_path = std::env::var("ROOST_DB_PATH").unwrap_or_else(|_| "roost.db".into());
    let host = std::env::var("ROOST_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("ROOST_PORT")
        .unwrap_or_else(|_| "8080".into())
        .parse()?;

    // Stores and shared state. The presence registry is built once here and
    // injected everywhere presence is consulted.
    let db = Database::open(&PathBuf::from(&db_path))?;
    let store = Store::new(db, Arc::new(MemoryCache::new()));
    let presence = Presence::new();
    let fanout = Fanout::new(presence, store.clone());

    let state: AppState = Arc::new(AppStateInner {
        store,
        fanout,
        jwt_secret,
    });

    // Routes
    let public_routes = Router::new()
        .route("/user/signup", post(auth::sign_up))
        .route("/user/signin", post(auth::sign_in));

    let protected_routes = Router::new()
        .route("/user/search", get(users::search_user))
        .route("/user/avatar", put(users::update_avatar))
        .route("/friend/request", post(friends::request_friend))
        .route("/friend/accept", put(friends::accept_friend))
        .route("/friend/delete", delete(friends::delete_friend))
        .route("/ws", get(ws_upgrade))
        .layer(middleware::from_fn(require_auth));

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("Roost server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn ws_upgrade(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        connection::handle_socket(socket, state.fanout.clone(), claims.sub)
    })
}
