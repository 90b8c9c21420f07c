use serde::{Deserialize, Serialize};

use crate::models::{Memory, MoodLog, Portal, Quote, SecureMessage};

// -- JWT Claims --

/// JWT claims shared across duet-api (REST middleware) and duet-gateway
/// (WebSocket authentication).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Portal,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub portal: Portal,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub portal: Portal,
}

// -- Storage --

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    pub public_url: String,
}

// -- Dashboard --

/// Everything a portal needs to seed its local state in one response.
#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub portal: Portal,
    pub mood: Option<MoodLog>,
    pub quote: Option<Quote>,
    pub secure_message: Option<SecureMessage>,
    pub memories: Vec<Memory>,
    pub peer_online: bool,
}
