//! HTTP client for the hosted advisor model, plus the streaming reply
//! decoder.
//!
//! The streaming path is a chunked body of SSE-style lines:
//! `data: {"content": "..."}` fragments, `data: {"error": "..."}` aborts.
//! Chunk boundaries are arbitrary — a line may arrive split across reads —
//! so undecoded bytes are carried in a buffer between pulls.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use super::{AnalysisReply, ChatRequest, ModelClient, ReplyStream};
use crate::error::{Error, Result};

/// Deadline for the non-streaming analysis call. The streaming call only
/// bounds connection establishment; a total-request deadline would cut
/// long replies off mid-stream.
const ANALYZE_TIMEOUT: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpModelClient {
    endpoint: String,
    api_key: String,
    client: Client,
}

impl HttpModelClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client,
        }
    }

    fn build_request_body(&self, request: &ChatRequest, stream: bool) -> Result<Value> {
        let mut body = serde_json::to_value(request)?;
        body.as_object_mut()
            .ok_or_else(|| Error::MalformedResponse("request did not serialize to an object".into()))?
            .insert("stream".into(), Value::Bool(stream));
        Ok(body)
    }

    async fn post(&self, body: &Value, timeout: Option<Duration>) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if !self.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", self.api_key));
        }
        if let Some(t) = timeout {
            req = req.timeout(t);
        }
        let response = req
            .json(body)
            .send()
            .await
            .map_err(|e| Error::from_transport(e, timeout.unwrap_or(CONNECT_TIMEOUT)))?;

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
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn analyze(&self, request: &ChatRequest) -> Result<AnalysisReply> {
        let body = self.build_request_body(request, false)?;
        let response = self.post(&body, Some(ANALYZE_TIMEOUT)).await?;
        let value: Value = response
            .json()
            .await
            .map_err(|e| Error::MalformedResponse(format!("analysis reply: {e}")))?;

        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(Error::Stream(err.to_string()));
        }
        let reply: AnalysisReply = serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("analysis reply: {e}")))?;
        Ok(reply)
    }

    async fn stream_chat(&self, request: &ChatRequest) -> Result<Box<dyn ReplyStream>> {
        let body = self.build_request_body(request, true)?;
        let response = self.post(&body, None).await?;
        Ok(Box::new(SseReplyStream::new(response)))
    }

    fn name(&self) -> &str {
        "advisor-http"
    }
}

// ── Streaming decoder ───────────────────────────────────────────────────

/// Raw byte chunks off the wire. Abstracted so the decoder can be driven
/// by scripted chunk sequences in tests.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>>;
}

#[async_trait]
impl ChunkSource for reqwest::Response {
    async fn next_bytes(&mut self) -> Result<Option<Vec<u8>>> {
        match self.chunk().await {
            Ok(Some(bytes)) => Ok(Some(bytes.to_vec())),
            Ok(None) => Ok(None),
            Err(e) => Err(Error::Stream(format!("stream read error: {e}"))),
        }
    }
}

/// Outcome of decoding one `data:` payload.
enum Fragment {
    Content(String),
    Failure(String),
    Skip,
}

fn parse_data_line(data: &str) -> Fragment {
    let trimmed = data.trim();
    if trimmed.is_empty() {
        return Fragment::Skip;
    }
    let parsed: Value = match serde_json::from_str(trimmed) {
        Ok(v) => v,
        Err(e) => return Fragment::Failure(format!("invalid JSON in stream: {e}")),
    };
    if let Some(err) = parsed.get("error").and_then(|e| e.as_str()) {
        return Fragment::Failure(err.to_string());
    }
    match parsed.get("content").and_then(|c| c.as_str()) {
        Some("") | None => Fragment::Skip,
        Some(text) => Fragment::Content(text.to_string()),
    }
}

/// Pull-based decoder over a chunked reply body.
///
/// The buffer holds bytes, not text, so a multi-byte character split
/// across two network reads reassembles losslessly.
pub struct SseReplyStream<S: ChunkSource> {
    source: S,
    buffer: Vec<u8>,
    done: bool,
}

impl<S: ChunkSource> SseReplyStream<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            done: false,
        }
    }

    /// Pop one complete line off the buffer, if any.
    fn take_line(&mut self) -> Option<String> {
        let pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line: Vec<u8> = self.buffer.drain(..=pos).collect();
        let line = String::from_utf8_lossy(&line);
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    fn decode_line(line: &str) -> Fragment {
        if line.is_empty() {
            return Fragment::Skip;
        }
        match line.strip_prefix("data: ") {
            Some(data) => parse_data_line(data),
            // Non-data SSE lines (comments, event:, id:, retry:) are noise.
            None => Fragment::Skip,
        }
    }
}

#[async_trait]
impl<S: ChunkSource> ReplyStream for SseReplyStream<S> {
    async fn next_fragment(&mut self) -> Option<Result<String>> {
        if self.done {
            return None;
        }

        loop {
            if let Some(line) = self.take_line() {
                match Self::decode_line(&line) {
                    Fragment::Content(text) => return Some(Ok(text)),
                    Fragment::Failure(msg) => {
                        self.done = true;
                        return Some(Err(Error::Stream(msg)));
                    }
                    Fragment::Skip => continue,
                }
            }

            match self.source.next_bytes().await {
                Ok(Some(bytes)) => self.buffer.extend_from_slice(&bytes),
                Ok(None) => {
                    // Stream closed. A trailing line without a terminating
                    // newline is still a complete payload.
                    self.done = true;
                    let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
                    self.buffer.clear();
                    match Self::decode_line(&rest) {
                        Fragment::Content(text) => return Some(Ok(text)),
                        Fragment::Failure(msg) => return Some(Err(Error::Stream(msg))),
                        Fragment::Skip => return None,
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
