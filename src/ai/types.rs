use serde::{Deserialize, Serialize};

use crate::store::types::{Role, Turn};

/// One message as the model sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTurn {
    pub role: Role,
    pub content: String,
}

impl From<&Turn> for WireTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

/// A persisted turn with its visual annotation, sent so the model can
/// ground follow-up answers in what it has already seen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualTurn {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_context: Option<String>,
}

impl From<&Turn> for VisualTurn {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
            visual_context: turn.visual_context.clone(),
        }
    }
}

/// Request body for both model paths.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub messages: Vec<WireTurn>,
    pub temperature: f32,
    pub model: String,
    /// Freshly captured still image, as a data-URI payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Most recent non-null visual context, last-write-wins over history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_context: Option<String>,
    /// The authoritative persisted history, reloaded just before the call.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub visual_history: Vec<VisualTurn>,
}

/// Reply from the non-streaming first-turn analysis path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReply {
    pub response: String,
    #[serde(default)]
    pub visual_context: Option<String>,
}
