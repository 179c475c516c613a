//! Conversation domain types and the persisted row shapes behind them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One ongoing advisory conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One message within a session, as held in memory by the UI/engine.
///
/// `id` is a process-local identifier, distinct from any server id, so the
/// engine can update an in-flight turn optimistically before persistence
/// confirms. `content` of an in-flight assistant turn grows as stream
/// fragments arrive and is frozen once `complete` is set.
#[derive(Debug, Clone, Serialize)]
pub struct Turn {
    pub id: u64,
    pub role: Role,
    pub content: String,
    /// Image payload (user turns) or textual appearance description
    /// (assistant turns) — the model's persistent visual memory.
    pub visual_context: Option<String>,
    pub created_at: DateTime<Utc>,
    pub complete: bool,
}

impl Turn {
    pub fn user(id: u64, content: impl Into<String>, visual_context: Option<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            visual_context,
            created_at: Utc::now(),
            complete: true,
        }
    }

    pub fn assistant(id: u64, content: impl Into<String>, visual_context: Option<String>) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: content.into(),
            visual_context,
            created_at: Utc::now(),
            complete: true,
        }
    }

    /// An empty in-flight assistant turn awaiting streamed content.
    pub fn assistant_placeholder(id: u64) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            visual_context: None,
            created_at: Utc::now(),
            complete: false,
        }
    }
}

/// Lifecycle status of an external video-avatar conversation. The remote
/// service owns the authoritative value; local copies are a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Active,
    Ended,
    Error,
}

impl VideoStatus {
    /// Map a remote status string. Unknown values are logged and treated
    /// as still-pending rather than failing the poll.
    pub fn from_remote(s: &str) -> Self {
        match s {
            "pending" | "starting" => VideoStatus::Pending,
            "active" => VideoStatus::Active,
            "ended" => VideoStatus::Ended,
            "error" => VideoStatus::Error,
            other => {
                log::warn!("Unknown remote conversation status {other:?}, treating as pending");
                VideoStatus::Pending
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Pending => "pending",
            VideoStatus::Active => "active",
            VideoStatus::Ended => "ended",
            VideoStatus::Error => "error",
        }
    }
}

// ── Persisted rows ──────────────────────────────────────────────────────
// The logical tables behind the generic persistence collaborator. Field
// names match the remote schema (snake_case columns).

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRow {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: String,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual_context: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSessionRow {
    pub id: String,
    pub conversation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_name: Option<String>,
    pub conversation_url: String,
    pub status: VideoStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
