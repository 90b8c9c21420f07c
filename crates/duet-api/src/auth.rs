use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde_json::json;
use tracing::{error, info, warn};

use duet_db::{BlobStore, Database};
use duet_gateway::Dispatcher;
use duet_gateway::session::issue_token;
use duet_types::Portal;
use duet_types::api::{Claims, LoginRequest, LoginResponse, SessionResponse};

use crate::companion::CompanionModel;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "duet_session";

/// Cookie lifetime, matching the token expiry.
const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub blobs: BlobStore,
    pub dispatcher: Dispatcher,
    pub jwt_secret: String,
    pub gate: Gate,
    pub companion: Arc<dyn CompanionModel>,
}

/// Password gate for the two portals.
///
/// This is a placeholder admission check: one shared secret per portal,
/// compared for equality. No hashing, rate limiting or lockout.
pub struct Gate {
    girlfriend: String,
    boyfriend: String,
}

impl Gate {
    pub fn new(girlfriend: impl Into<String>, boyfriend: impl Into<String>) -> Self {
        Self {
            girlfriend: girlfriend.into(),
            boyfriend: boyfriend.into(),
        }
    }

    /// Returns the portal whose password matches the (trimmed) submission.
    pub fn admit(&self, submitted: &str) -> Option<Portal> {
        let submitted = submitted.trim();
        if submitted.is_empty() {
            return None;
        }
        if submitted == self.girlfriend {
            Some(Portal::Girlfriend)
        } else if submitted == self.boyfriend {
            Some(Portal::Boyfriend)
        } else {
            None
        }
    }
}

/// GET /login
pub async fn login_page() -> impl IntoResponse {
    Json(json!({
        "gate": "password",
        "login": "/api/auth/login",
    }))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, StatusCode> {
    let portal = match state.gate.admit(&req.password) {
        Some(portal) => portal,
        None => {
            warn!("Gate denied a login attempt");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    let token = issue_token(&state.jwt_secret, portal).map_err(|e| {
        error!("Failed to sign session token: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    info!("{} portal logged in", portal);

    let cookie = format!(
        "{}={}; HttpOnly; Path=/; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, SESSION_MAX_AGE_SECS
    );

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(LoginResponse { portal, token }),
    ))
}

/// POST /api/auth/logout
pub async fn logout() -> impl IntoResponse {
    let cookie = format!("{}=; HttpOnly; Path=/; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    (StatusCode::NO_CONTENT, [(header::SET_COOKIE, cookie)])
}

/// GET /api/auth/session
pub async fn session(Extension(claims): Extension<Claims>) -> Json<SessionResponse> {
    Json(SessionResponse { portal: claims.sub })
}
