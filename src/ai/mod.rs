use async_trait::async_trait;

pub mod http;
pub mod types;
pub use http::HttpModelClient;
pub use types::*;

use crate::error::Result;

/// Client for the hosted advisor model endpoint.
///
/// Two call shapes, per the service contract: the first turn of a session
/// goes through the non-streaming analysis path (one JSON object, possibly
/// carrying a fresh visual-context description), follow-up turns stream
/// their reply incrementally.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// First-turn analysis: single JSON response.
    async fn analyze(&self, request: &ChatRequest) -> Result<AnalysisReply>;

    /// Follow-up turn: chunked reply, decoded fragment by fragment.
    async fn stream_chat(&self, request: &ChatRequest) -> Result<Box<dyn ReplyStream>>;

    /// Client name for logging/display.
    fn name(&self) -> &str;
}

/// Pull-based sequence of decoded reply fragments.
///
/// The consumer applies one state transition per fragment; transport
/// chunking is invisible here, which keeps content accumulation testable
/// independent of the network.
#[async_trait]
pub trait ReplyStream: Send {
    /// Next text fragment. `None` when the stream is complete.
    async fn next_fragment(&mut self) -> Option<Result<String>>;
}
