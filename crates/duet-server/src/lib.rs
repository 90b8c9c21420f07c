pub mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use duet_api::middleware::{require_auth, require_page_session};
use duet_api::storage::MAX_BLOB_SIZE;
use duet_api::{AppState, AppStateInner, Gate, GeminiModel};
use duet_api::{auth, companion, dashboard, rows, storage};
use duet_db::{BlobStore, Database};
use duet_gateway::Dispatcher;
use duet_gateway::connection;

use crate::config::Config;

/// Open storage and assemble shared state from configuration.
pub async fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let db = Database::open(&config.db_path)?;
    let blobs = BlobStore::new(config.blob_dir.clone(), &config.public_url).await?;

    Ok(Arc::new(AppStateInner {
        db,
        blobs,
        dispatcher: Dispatcher::new(),
        jwt_secret: config.jwt_secret.clone(),
        gate: Gate::new(&config.girlfriend_password, &config.boyfriend_password),
        companion: Arc::new(GeminiModel::new(
            config.gemini_api_key.clone(),
            &config.gemini_model,
        )),
    }))
}

pub fn build_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), require_auth);

    let public_routes = Router::new()
        .route("/login", get(auth::login_page))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/gateway", get(ws_upgrade))
        .route("/health", get(health))
        // Downloads are public, uploads need a session
        .route(
            "/storage/memories/{name}",
            get(storage::download_memory).merge(
                put(storage::upload_memory)
                    .layer(DefaultBodyLimit::max(MAX_BLOB_SIZE))
                    .layer(auth_layer.clone()),
            ),
        );

    let protected_routes = Router::new()
        .route("/api/auth/session", get(auth::session))
        .route("/api/dashboard", get(dashboard::snapshot))
        .route("/api/rows", post(rows::insert_row))
        .route("/api/rows/{table}", get(rows::list_rows))
        .route("/api/companion", post(companion::chat))
        .route_layer(auth_layer);

    let page_routes = Router::new()
        .route("/", get(dashboard::snapshot))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_page_session,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(page_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let dispatcher = state.dispatcher.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, jwt_secret))
}
