//! The generic persistence collaborator behind the conversation store.
//!
//! Everything the core persists goes through this trait, so the engine and
//! the video manager never know whether rows live in a hosted REST data
//! API or an in-memory map in a test.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::store::types::{MessageRow, SessionRow, VideoSessionRow, VideoStatus};

/// Row-level persistence operations over the three logical tables.
///
/// Ordering contracts live here: `list_sessions` returns newest-activity
/// first, `list_messages` returns oldest first. The backend is assumed to
/// serialize per-row writes; no partial reads are observable across
/// concurrent writers.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    async fn insert_session(&self, row: &SessionRow) -> Result<()>;

    /// Bump a session's `updated_at`.
    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> Result<()>;

    /// All sessions, ordered by `updated_at` descending.
    async fn list_sessions(&self) -> Result<Vec<SessionRow>>;

    /// Delete a session and its messages.
    async fn delete_session(&self, id: &str) -> Result<()>;

    async fn insert_message(&self, row: &MessageRow) -> Result<()>;

    /// A session's messages, ordered by `created_at` ascending.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>>;

    async fn insert_video_session(&self, row: &VideoSessionRow) -> Result<()>;

    /// Update the cached status of a persisted video-session record.
    async fn set_video_status(
        &self,
        conversation_id: &str,
        status: VideoStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;
}
