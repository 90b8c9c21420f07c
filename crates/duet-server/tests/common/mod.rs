use std::sync::Arc;

use tempfile::TempDir;

use duet_api::{AppState, AppStateInner, Gate, GeminiModel};
use duet_db::{BlobStore, Database};
use duet_gateway::Dispatcher;

pub const GIRLFRIEND_PASSWORD: &str = "moonlight";
pub const BOYFRIEND_PASSWORD: &str = "sunrise";

/// In-memory database and temporary blob directory; the companion has no key
/// so every chat gets the fallback reply.
pub async fn test_state(public_url: &str) -> (AppState, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let blobs = BlobStore::new(dir.path().join("memories"), public_url)
        .await
        .unwrap();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        blobs,
        dispatcher: Dispatcher::new(),
        jwt_secret: "integration-secret".to_string(),
        gate: Gate::new(GIRLFRIEND_PASSWORD, BOYFRIEND_PASSWORD),
        companion: Arc::new(GeminiModel::new(None, "unused")),
    });
    (state, dir)
}
