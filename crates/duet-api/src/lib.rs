pub mod auth;
pub mod companion;
pub mod dashboard;
pub mod middleware;
pub mod rows;
pub mod storage;

pub use auth::{AppState, AppStateInner, Gate};
pub use companion::{CompanionModel, GeminiModel};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use tempfile::TempDir;

    use duet_db::{BlobStore, Database};
    use duet_gateway::Dispatcher;

    use crate::auth::{AppState, AppStateInner, Gate};
    use crate::companion::{CompanionModel, GeminiModel};

    pub const TEST_SECRET: &str = "test-secret";

    pub async fn test_state() -> (AppState, TempDir) {
        test_state_with(Arc::new(GeminiModel::new(None, "unused"))).await
    }

    pub async fn test_state_with(companion: Arc<dyn CompanionModel>) -> (AppState, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let blobs = BlobStore::new(dir.path().join("memories"), "http://duet.test")
            .await
            .unwrap();
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            blobs,
            dispatcher: Dispatcher::new(),
            jwt_secret: TEST_SECRET.to_string(),
            gate: Gate::new("moonlight", "sunrise"),
            companion,
        });
        (state, dir)
    }
}
