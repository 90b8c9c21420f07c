use axum::{Extension, Json, extract::State, http::StatusCode};
use tracing::error;

use duet_types::api::{Claims, DashboardSnapshot};
use duet_types::{MoodLog, Quote, SecureMessage};

use crate::auth::AppState;

/// Memories included in the dashboard snapshot.
pub const SNAPSHOT_MEMORIES: u32 = 50;

/// GET /: everything the portal needs to seed its local state.
pub async fn snapshot(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<DashboardSnapshot>, StatusCode> {
    let db = state.clone();
    let (mood, quote, secure_message, memories) = tokio::task::spawn_blocking(move || {
        Ok::<_, anyhow::Error>((
            db.db.latest::<MoodLog>()?,
            db.db.latest::<Quote>()?,
            db.db.latest::<SecureMessage>()?,
            db.db.recent_memories(SNAPSHOT_MEMORIES)?,
        ))
    })
    .await
    .map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?
    .map_err(|e| {
        error!("DB snapshot error: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    let peer_online = state.dispatcher.is_online(claims.sub.peer()).await;

    Ok(Json(DashboardSnapshot {
        portal: claims.sub,
        mood,
        quote,
        secure_message,
        memories,
        peer_online,
    }))
}
