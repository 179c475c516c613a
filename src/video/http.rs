//! HTTP transport for the video-avatar service — a single action-dispatch
//! POST endpoint. The 60-second deadline maps to a timeout-specific error
//! so callers can tell "slow service" from "broken service".

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{CreateConversationReply, VideoServiceClient};
use crate::error::{Error, Result};
use crate::store::VideoStatus;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpVideoClient {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpVideoClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn build_action_body(action: &str, params: Value) -> Value {
        let mut body = json!({ "action": action });
        if let (Some(obj), Some(extra)) = (body.as_object_mut(), params.as_object()) {
            for (k, v) in extra {
                obj.insert(k.clone(), v.clone());
            }
        }
        body
    }

    async fn dispatch(&self, body: &Value) -> Result<Value> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .timeout(REQUEST_TIMEOUT);
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }

        let response = req
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".into());
            return Err(Error::RemoteCall {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::MalformedResponse(format!("video service reply: {e}")))
    }
}

#[async_trait]
impl VideoServiceClient for HttpVideoClient {
    async fn create_conversation(
        &self,
        conversation_name: &str,
        conversational_context: &str,
        persona_id: &str,
    ) -> Result<CreateConversationReply> {
        let body = Self::build_action_body(
            "create_conversation",
            json!({
                "conversation_name": conversation_name,
                "conversational_context": conversational_context,
                "persona_id": persona_id,
            }),
        );
        let reply = self.dispatch(&body).await?;
        serde_json::from_value(reply)
            .map_err(|e| Error::MalformedResponse(format!("create_conversation reply: {e}")))
    }

    async fn get_conversation_status(&self, conversation_id: &str) -> Result<VideoStatus> {
        let body = Self::build_action_body(
            "get_conversation_status",
            json!({ "conversation_id": conversation_id }),
        );
        let reply = self.dispatch(&body).await?;
        let status = reply
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or_else(|| Error::MalformedResponse("status reply missing status".into()))?;
        Ok(VideoStatus::from_remote(status))
    }

    async fn end_conversation(&self, conversation_id: &str) -> Result<()> {
        let body = Self::build_action_body(
            "end_conversation",
            json!({ "conversation_id": conversation_id }),
        );
        self.dispatch(&body).await?;
        Ok(())
    }

    fn name(&self) -> &str {
        "video-avatar-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_body_carries_action_and_params() {
        let body = HttpVideoClient::build_action_body(
            "create_conversation",
            json!({
                "conversation_name": "Style check",
                "conversational_context": "User wants outfit feedback",
                "persona_id": "p_style_01",
            }),
        );
        assert_eq!(body["action"], "create_conversation");
        assert_eq!(body["conversation_name"], "Style check");
        assert_eq!(body["conversational_context"], "User wants outfit feedback");
        assert_eq!(body["persona_id"], "p_style_01");
    }

    #[test]
    fn status_body_carries_conversation_id() {
        let body = HttpVideoClient::build_action_body(
            "get_conversation_status",
            json!({ "conversation_id": "c_123" }),
        );
        assert_eq!(body["action"], "get_conversation_status");
        assert_eq!(body["conversation_id"], "c_123");
    }

    #[test]
    fn create_reply_tolerates_extra_fields() {
        let reply: CreateConversationReply = serde_json::from_value(json!({
            "conversation_id": "c_123",
            "conversation_url": "https://avatar.example.com/c_123",
            "status": "pending",
            "callback_url": null,
            "created_at": "2026-08-06T10:00:00Z",
        }))
        .unwrap();
        assert_eq!(reply.conversation_id.as_deref(), Some("c_123"));
        assert_eq!(
            reply.conversation_url.as_deref(),
            Some("https://avatar.example.com/c_123")
        );
    }

    #[test]
    fn create_reply_fields_may_be_absent() {
        let reply: CreateConversationReply =
            serde_json::from_value(json!({ "status": "pending" })).unwrap();
        assert!(reply.conversation_id.is_none());
        assert!(reply.conversation_url.is_none());
    }
}
