use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod http;
pub mod manager;

pub use http::HttpVideoClient;
pub use manager::VideoSessionManager;

use crate::error::Result;
use crate::store::VideoStatus;

/// Handle to a live external video-avatar conversation.
#[derive(Debug, Clone, Serialize)]
pub struct VideoSession {
    pub conversation_id: String,
    pub conversation_url: String,
    pub status: VideoStatus,
    /// Chat session this conversation is associated with, if any.
    pub session_id: Option<String>,
}

/// Raw create reply as the service sends it. Field presence is validated
/// by the manager — a 2xx with either field missing is still malformed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateConversationReply {
    pub conversation_id: Option<String>,
    pub conversation_url: Option<String>,
    pub status: Option<String>,
}

/// The remote video-avatar service: create / poll / end.
#[async_trait]
pub trait VideoServiceClient: Send + Sync {
    async fn create_conversation(
        &self,
        conversation_name: &str,
        conversational_context: &str,
        persona_id: &str,
    ) -> Result<CreateConversationReply>;

    async fn get_conversation_status(&self, conversation_id: &str) -> Result<VideoStatus>;

    async fn end_conversation(&self, conversation_id: &str) -> Result<()>;

    /// Client name for logging/display.
    fn name(&self) -> &str;
}
