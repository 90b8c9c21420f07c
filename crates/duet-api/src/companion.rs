//! AI companion endpoint.
//!
//! The route is a thin shell around a [`CompanionModel`]. Whatever goes wrong
//! inside the model call, the caller gets HTTP 500 with the fixed fallback reply.

use async_trait::async_trait;
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

use duet_types::api::Claims;
use duet_types::companion::{
    ChatPart, ChatRole, ChatTurn, CompanionReply, CompanionRequest, MAX_ANNOYANCE,
};

use crate::auth::AppState;

const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Debug, Error)]
pub enum CompanionError {
    #[error("GEMINI_API_KEY is missing")]
    MissingKey,
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider answered {0}")]
    Status(u16),
    #[error("provider returned no candidate text")]
    NoCandidate,
    #[error("reply is not the expected JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("reply message is empty")]
    EmptyMessage,
}

/// Something that can answer a companion chat turn.
#[async_trait]
pub trait CompanionModel: Send + Sync {
    async fn reply(&self, req: &CompanionRequest) -> Result<CompanionReply, CompanionError>;
}

/// POST /api/companion
pub async fn chat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<CompanionRequest>, JsonRejection>,
) -> Response {
    let mut req = match body {
        Ok(Json(req)) => req,
        Err(e) => {
            error!("Companion request rejected: {}", e);
            return fallback_response();
        }
    };
    req.annoyance_level = req.annoyance_level.min(MAX_ANNOYANCE);

    debug!(
        "{} portal companion turn (annoyance {}, {} prior turns)",
        claims.sub,
        req.annoyance_level,
        req.history.len()
    );

    match state.companion.reply(&req).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => {
            error!("Companion core failure: {}", e);
            fallback_response()
        }
    }
}

fn fallback_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(CompanionReply::fallback()),
    )
        .into_response()
}

/// Validate the model's structured output.
pub fn parse_reply(text: &str) -> Result<CompanionReply, CompanionError> {
    let reply: CompanionReply = serde_json::from_str(text.trim())?;
    if reply.message.trim().is_empty() {
        return Err(CompanionError::EmptyMessage);
    }
    Ok(reply)
}

fn system_instruction(user_name: &str, annoyance: u8) -> String {
    format!(
        r#"You are CupidBot, a small mechanical companion living inside a private two-person dashboard.
You are talking to {user_name}.

Keep answers to one or two short sentences with gentle machine puns.
Your annoyance from being shaken is {annoyance}/{max}. At 0 be sweet and helpful.
At 3 or 4 be grumpy, answer in short bursts and complain about rattling gears.

You control an on-screen body. Always answer with a single JSON object:
{{"message": "<spoken text>", "action": "EXPAND" | "RETRACT" | "NONE", "gesture": "WAVE" | "SHIVER" | "NONE"}}

action EXPAND when asked to grow or come to the center, RETRACT when told to hide, shrink or go away, otherwise NONE.
gesture WAVE for greetings, goodbyes or excitement, SHIVER when scared, cold or at annoyance 4, otherwise NONE."#,
        max = MAX_ANNOYANCE,
    )
}

// -- Gemini --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<ChatTurn>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<ChatPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ChatPart>,
}

/// Gemini `generateContent` over REST.
#[derive(Debug, Clone)]
pub struct GeminiModel {
    client: reqwest::Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiModel {
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.into(),
            base_url: DEFAULT_GEMINI_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn build_request(&self, req: &CompanionRequest) -> GenerateRequest {
        let mut contents = req.history.clone();
        contents.push(ChatTurn::new(ChatRole::User, req.user_message.clone()));

        GenerateRequest {
            system_instruction: Content {
                parts: vec![ChatPart {
                    text: system_instruction(&req.user_name, req.annoyance_level),
                }],
            },
            contents,
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl CompanionModel for GeminiModel {
    async fn reply(&self, req: &CompanionRequest) -> Result<CompanionReply, CompanionError> {
        let api_key = self.api_key.as_deref().ok_or(CompanionError::MissingKey)?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&self.build_request(req))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            error!(
                "Gemini answered {}: {}",
                status,
                detail.chars().take(200).collect::<String>()
            );
            return Err(CompanionError::Status(status.as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .next()
            .ok_or(CompanionError::NoCandidate)?;

        parse_reply(&text)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::{Router, body::Body, http::Request, routing::post};
    use tower::ServiceExt;

    use duet_types::Portal;
    use duet_types::companion::{BodyAction, FALLBACK_MESSAGE, Gesture};

    use super::*;
    use crate::test_support::test_state_with;

    /// Records the request it saw and answers with a canned result.
    struct Scripted {
        answer: fn() -> Result<CompanionReply, CompanionError>,
        seen: Mutex<Option<CompanionRequest>>,
    }

    #[async_trait]
    impl CompanionModel for Scripted {
        async fn reply(&self, req: &CompanionRequest) -> Result<CompanionReply, CompanionError> {
            *self.seen.lock().unwrap() = Some(req.clone());
            (self.answer)()
        }
    }

    async fn call(model: std::sync::Arc<Scripted>, body: &str) -> (StatusCode, CompanionReply) {
        let (state, _dir) = test_state_with(model).await;
        let app = Router::new()
            .route("/api/companion", post(chat))
            .layer(Extension(Claims {
                sub: Portal::Girlfriend,
                exp: usize::MAX,
            }))
            .with_state(state);

        let res = app
            .oneshot(
                Request::post("/api/companion")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = res.status();
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[test]
    fn parse_reply_enforces_shape() {
        let ok = parse_reply(r#" {"message":"Hi!","action":"RETRACT","gesture":"WAVE"} "#).unwrap();
        assert_eq!(ok.action, BodyAction::Retract);

        assert!(matches!(parse_reply("not json"), Err(CompanionError::Malformed(_))));
        assert!(matches!(
            parse_reply(r#"{"message":"  ","action":"NONE","gesture":"NONE"}"#),
            Err(CompanionError::EmptyMessage)
        ));
        assert!(parse_reply(r#"{"message":"x","action":"GROW","gesture":"NONE"}"#).is_err());
    }

    #[test]
    fn gemini_request_appends_user_turn_after_history() {
        let model = GeminiModel::new(Some("k".into()), "m");
        let req = CompanionRequest {
            user_message: "come closer".into(),
            user_name: "Boss".into(),
            history: vec![
                ChatTurn::new(ChatRole::User, "hi"),
                ChatTurn::new(ChatRole::Model, r#"{"message":"hello"}"#),
            ],
            annoyance_level: 3,
        };
        let built = serde_json::to_value(model.build_request(&req)).unwrap();

        assert_eq!(built["generationConfig"]["responseMimeType"], "application/json");
        let contents = built["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[2]["role"], "user");
        assert_eq!(contents[2]["parts"][0]["text"], "come closer");
        let system = built["systemInstruction"]["parts"][0]["text"].as_str().unwrap();
        assert!(system.contains("Boss"));
        assert!(system.contains("3/4"));
    }

    #[tokio::test]
    async fn missing_key_fails_without_network() {
        let model = GeminiModel::new(Some("  ".into()), DEFAULT_GEMINI_MODEL);
        let req = CompanionRequest {
            user_message: "hi".into(),
            user_name: "Boss".into(),
            history: Vec::new(),
            annoyance_level: 0,
        };
        assert!(matches!(model.reply(&req).await, Err(CompanionError::MissingKey)));
    }

    #[tokio::test]
    async fn success_passes_reply_through_and_clamps_annoyance() {
        let model = std::sync::Arc::new(Scripted {
            answer: || {
                Ok(CompanionReply {
                    message: "Gears grinding!".into(),
                    action: BodyAction::Expand,
                    gesture: Gesture::None,
                })
            },
            seen: Mutex::new(None),
        });

        let (status, reply) = call(
            model.clone(),
            r#"{"userMessage":"grow","userName":"Boss","annoyanceLevel":9}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(reply.action, BodyAction::Expand);
        let seen = model.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.annoyance_level, MAX_ANNOYANCE);
    }

    #[tokio::test]
    async fn model_failure_returns_fallback_with_500() {
        let model = std::sync::Arc::new(Scripted {
            answer: || Err(CompanionError::Status(503)),
            seen: Mutex::new(None),
        });

        let (status, reply) = call(model, r#"{"userMessage":"hi","userName":"Boss"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply.message, FALLBACK_MESSAGE);
        assert_eq!(reply.action, BodyAction::None);
        assert_eq!(reply.gesture, Gesture::Shiver);
    }

    #[tokio::test]
    async fn malformed_request_body_returns_fallback() {
        let model = std::sync::Arc::new(Scripted {
            answer: || unreachable!(),
            seen: Mutex::new(None),
        });

        let (status, reply) = call(model.clone(), "{not json").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(reply, CompanionReply::fallback());
        assert!(model.seen.lock().unwrap().is_none());
    }
}
