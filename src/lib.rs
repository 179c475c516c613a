//! preen — core engine for a webcam AI style advisor.
//!
//! The embedding UI supplies a video [`FrameSource`] and (optionally) a
//! [`SpeechRecognizer`]; preen handles the rest: opportunistic image
//! capture, debounced end-of-turn detection, conversation persistence,
//! streaming chat-turn orchestration, and the lifecycle of external
//! video-avatar conversations.
//!
//! The two orchestrators are [`ChatStreamEngine`] (one chat turn end to
//! end, with the reply streamed into the transcript) and
//! [`VideoSessionManager`] (cleanup-before-create, status polling,
//! teardown). Both report to the UI over channels; nothing here renders.
//!
//! [`FrameSource`]: capture::FrameSource
//! [`SpeechRecognizer`]: capture::SpeechRecognizer
//! [`ChatStreamEngine`]: chat::ChatStreamEngine
//! [`VideoSessionManager`]: video::VideoSessionManager

pub mod ai;
pub mod capture;
pub mod chat;
pub mod error;
pub mod notify;
pub mod settings;
pub mod store;
pub mod video;

pub use ai::{ModelClient, ReplyStream};
pub use capture::{FrameSource, ImageCapture, SpeechRecognizer, TurnTranscriptSource};
pub use chat::{ChatEvent, ChatStreamEngine};
pub use error::{Error, Result};
pub use notify::{Notice, NoticeLevel};
pub use settings::Settings;
pub use store::{ConversationStore, Role, Session, Turn, VideoStatus};
pub use video::{VideoServiceClient, VideoSession, VideoSessionManager};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The fully wired advisor core: one chat engine, one video-session
/// manager, one transcript source, plus the channels the UI drains.
pub struct AdvisorCore {
    pub engine: ChatStreamEngine,
    pub chat_events: mpsc::UnboundedReceiver<ChatEvent>,
    pub video: VideoSessionManager,
    pub video_notices: notify::NoticeReceiver,
    pub transcript: TurnTranscriptSource,
    pub transcript_notices: notify::NoticeReceiver,
}

/// Wire the production HTTP transports into a ready advisor core.
///
/// `frame_source` is the injected camera handle; `None` means every send
/// goes text-only.
pub fn build_core(settings: &Settings, frame_source: Option<Arc<dyn FrameSource>>) -> AdvisorCore {
    let backend: Arc<dyn store::StoreBackend> = Arc::new(store::RestBackend::new(
        &settings.store_endpoint,
        &settings.store_api_key,
    ));
    let conversations = Arc::new(ConversationStore::new(backend.clone()));

    let model = Arc::new(ai::HttpModelClient::new(
        &settings.model_endpoint,
        &settings.model_api_key,
    ));
    let camera = frame_source
        .map(|s| ImageCapture::new(s, settings.jpeg_quality, settings.max_image_width));
    let (engine, chat_events) =
        ChatStreamEngine::new(conversations, model, camera, settings.model.clone());

    let video_client = Arc::new(video::HttpVideoClient::new(
        &settings.video_endpoint,
        &settings.video_api_key,
    ));
    let (video, video_notices) = VideoSessionManager::new(video_client, backend);
    let video = video.with_cleanup_grace(Duration::from_millis(settings.cleanup_grace_ms));

    let (transcript_tx, transcript_notices) = mpsc::unbounded_channel();
    let transcript = TurnTranscriptSource::new(
        Duration::from_millis(settings.silence_timeout_ms),
        Duration::from_millis(settings.transcript_clear_delay_ms),
        transcript_tx,
    );

    AdvisorCore {
        engine,
        chat_events,
        video,
        video_notices,
        transcript,
        transcript_notices,
    }
}
