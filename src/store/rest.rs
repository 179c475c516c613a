//! HTTP implementation of [`StoreBackend`] against a hosted REST data API
//! (PostgREST-style row endpoints: table path, `eq.` filters, `order=`
//! params, apikey + bearer headers).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::store::backend::StoreBackend;
use crate::store::types::{MessageRow, SessionRow, VideoSessionRow, VideoStatus};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RestBackend {
    base_url: String,
    api_key: String,
    client: Client,
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: Client::new(),
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url.trim_end_matches('/'), table)
    }

    fn authed(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .timeout(REQUEST_TIMEOUT)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response> {
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
        Ok(response)
    }

    async fn insert<T: serde::Serialize>(&self, table: &str, row: &T) -> Result<()> {
        let response = self
            .authed(self.client.post(self.table_url(table)))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        Self::expect_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl StoreBackend for RestBackend {
    async fn insert_session(&self, row: &SessionRow) -> Result<()> {
        self.insert("sessions", row).await
    }

    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        let url = format!("{}?id=eq.{}", self.table_url("sessions"), id);
        let response = self
            .authed(self.client.patch(&url))
            .header("Prefer", "return=minimal")
            .json(&json!({ "updated_at": at }))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        let url = format!(
            "{}?select=*&order=updated_at.desc",
            self.table_url("sessions")
        );
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        let response = Self::expect_success(response).await?;
        let rows = response
            .json::<Vec<SessionRow>>()
            .await
            .map_err(|e| Error::MalformedResponse(format!("sessions list: {e}")))?;
        Ok(rows)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        // Messages first so a half-applied delete never orphans rows that
        // would still be listed under the session.
        let messages = format!("{}?session_id=eq.{}", self.table_url("messages"), id);
        let response = self
            .authed(self.client.delete(&messages))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        Self::expect_success(response).await?;

        let sessions = format!("{}?id=eq.{}", self.table_url("sessions"), id);
        let response = self
            .authed(self.client.delete(&sessions))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        Self::expect_success(response).await?;
        Ok(())
    }

    async fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.insert("messages", row).await
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        let url = format!(
            "{}?select=*&session_id=eq.{}&order=created_at.asc",
            self.table_url("messages"),
            session_id
        );
        let response = self
            .authed(self.client.get(&url))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        let response = Self::expect_success(response).await?;
        let rows = response
            .json::<Vec<MessageRow>>()
            .await
            .map_err(|e| Error::MalformedResponse(format!("messages list: {e}")))?;
        Ok(rows)
    }

    async fn insert_video_session(&self, row: &VideoSessionRow) -> Result<()> {
        self.insert("video_sessions", row).await
    }

    async fn set_video_status(
        &self,
        conversation_id: &str,
        status: VideoStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let url = format!(
            "{}?conversation_id=eq.{}",
            self.table_url("video_sessions"),
            conversation_id
        );
        let response = self
            .authed(self.client.patch(&url))
            .header("Prefer", "return=minimal")
            .json(&json!({ "status": status.as_str(), "updated_at": at }))
            .send()
            .await
            .map_err(|e| Error::from_transport(e, REQUEST_TIMEOUT))?;
        Self::expect_success(response).await?;
        Ok(())
    }
}
