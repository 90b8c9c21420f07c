use serde::{Deserialize, Serialize};

/// Highest annoyance level the companion is told about.
pub const MAX_ANNOYANCE: u8 = 4;

pub const FALLBACK_MESSAGE: &str =
    "Bzzzt... My logic circuits are scrambled! Tell the Boss to check the server logs. ⚙️";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPart {
    pub text: String,
}

/// One prior turn of the conversation, in the provider's history shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub parts: Vec<ChatPart>,
}

impl ChatTurn {
    pub fn new(role: ChatRole, text: impl Into<String>) -> Self {
        Self {
            role,
            parts: vec![ChatPart { text: text.into() }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionRequest {
    pub user_message: String,
    pub user_name: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub annoyance_level: u8,
}

/// What the companion does with its on-screen chassis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BodyAction {
    Expand,
    Retract,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gesture {
    Wave,
    Shiver,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionReply {
    pub message: String,
    pub action: BodyAction,
    pub gesture: Gesture,
}

impl CompanionReply {
    /// Returned with HTTP 500 whenever the model call fails.
    pub fn fallback() -> Self {
        Self {
            message: FALLBACK_MESSAGE.to_string(),
            action: BodyAction::None,
            gesture: Gesture::Shiver,
        }
    }
}
