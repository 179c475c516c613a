// manager.rs — Lifecycle of external video-avatar conversations.
//
// The remote service enforces a hard cap on simultaneous conversations, so
// creation always runs the cleanup-before-create protocol: end everything
// we believe is live, wait a short grace period for the slots to free,
// then create. The local active-id set is a cache of what is believed
// live remotely; it is only ever mutated here.

use chrono::Utc;
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use super::{VideoServiceClient, VideoSession};
use crate::error::{Error, Result};
use crate::notify::{Notice, NoticeReceiver, NoticeSender};
use crate::store::{StoreBackend, VideoSessionRow, VideoStatus};

const DEFAULT_CLEANUP_GRACE: Duration = Duration::from_millis(500);
const STATUS_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct VideoSessionManager {
    client: Arc<dyn VideoServiceClient>,
    backend: Arc<dyn StoreBackend>,
    /// Conversation ids believed live remotely.
    active: Mutex<HashSet<String>>,
    /// The conversation the UI is currently embedding, if any.
    current: Mutex<Option<String>>,
    cleanup_grace: Duration,
    notices: NoticeSender,
}

impl VideoSessionManager {
    /// Build a manager and the notice stream the embedding UI drains.
    pub fn new(
        client: Arc<dyn VideoServiceClient>,
        backend: Arc<dyn StoreBackend>,
    ) -> (Self, NoticeReceiver) {
        let (notices, rx) = tokio::sync::mpsc::unbounded_channel();
        (
            Self {
                client,
                backend,
                active: Mutex::new(HashSet::new()),
                current: Mutex::new(None),
                cleanup_grace: DEFAULT_CLEANUP_GRACE,
                notices,
            },
            rx,
        )
    }

    /// Override the post-cleanup grace period (tests use zero).
    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Snapshot of locally tracked live conversation ids.
    pub fn active_ids(&self) -> Vec<String> {
        self.active.lock().unwrap().iter().cloned().collect()
    }

    pub fn current_conversation(&self) -> Option<String> {
        self.current.lock().unwrap().clone()
    }

    /// Start a new conversation, tearing down any tracked live ones first.
    ///
    /// The grace period between cleanup and create is a heuristic, not a
    /// guarantee — it gives the service time to release its slots so
    /// back-to-back starts don't fail nondeterministically on the cap.
    pub async fn create_session(
        &self,
        conversation_name: &str,
        conversational_context: &str,
        persona_id: &str,
        session_id: Option<&str>,
    ) -> Result<VideoSession> {
        self.end_all_active().await;
        tokio::time::sleep(self.cleanup_grace).await;

        let reply = match self
            .client
            .create_conversation(conversation_name, conversational_context, persona_id)
            .await
        {
            Ok(reply) => reply,
            Err(err) => {
                if is_concurrency_limit(&err) {
                    log::warn!("Video service still at capacity: {err}");
                    let _ = self.notices.send(Notice::info(
                        "Please wait a moment — cleaning up previous video sessions.",
                    ));
                    return Err(Error::ConcurrencyLimit);
                }
                log::error!("Failed to create conversation: {err}");
                let _ = self
                    .notices
                    .send(Notice::error("Couldn't start the video stylist. Please try again."));
                return Err(err);
            }
        };

        // A success status with a missing id or URL is still unusable.
        let conversation_id = reply
            .conversation_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::MalformedResponse("create reply missing conversation_id".into()))?;
        let conversation_url = reply
            .conversation_url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::MalformedResponse("create reply missing conversation_url".into()))?;
        Url::parse(&conversation_url)
            .map_err(|e| Error::MalformedResponse(format!("conversation_url not joinable: {e}")))?;
        let status = reply
            .status
            .as_deref()
            .map(VideoStatus::from_remote)
            .unwrap_or(VideoStatus::Pending);

        self.active.lock().unwrap().insert(conversation_id.clone());
        *self.current.lock().unwrap() = Some(conversation_id.clone());
        log::info!("Created conversation {conversation_id} ({status:?})");

        // Best-effort record: the remote session exists either way, and the
        // caller must not see it orphaned over a bookkeeping failure.
        let now = Utc::now();
        let row = VideoSessionRow {
            id: Uuid::new_v4().to_string(),
            conversation_id: conversation_id.clone(),
            conversation_name: Some(conversation_name.to_string()),
            conversation_url: conversation_url.clone(),
            status,
            callback_url: None,
            user_id: None,
            session_id: session_id.map(str::to_string),
            created_at: now,
            updated_at: now,
        };
        if let Err(e) = self.backend.insert_video_session(&row).await {
            log::error!("Failed to persist video session record: {e}");
        }

        Ok(VideoSession {
            conversation_id,
            conversation_url,
            status,
            session_id: session_id.map(str::to_string),
        })
    }

    /// End a conversation. The id leaves local tracking whether or not the
    /// remote call succeeds — tracking must not leak. Cleanup callers pass
    /// `notify = false` and never see a failure; the user-initiated path
    /// surfaces it.
    pub async fn end_session(&self, conversation_id: &str, notify: bool) -> Result<()> {
        let remote = self.client.end_conversation(conversation_id).await;

        self.active.lock().unwrap().remove(conversation_id);
        {
            let mut current = self.current.lock().unwrap();
            if current.as_deref() == Some(conversation_id) {
                *current = None;
            }
        }
        if let Err(e) = self
            .backend
            .set_video_status(conversation_id, VideoStatus::Ended, Utc::now())
            .await
        {
            log::warn!("Failed to mark conversation {conversation_id} ended: {e}");
        }

        match remote {
            Ok(()) => Ok(()),
            Err(err) if notify => {
                log::error!("Failed to end conversation {conversation_id}: {err}");
                let _ = self
                    .notices
                    .send(Notice::error("Couldn't end the video session cleanly."));
                Err(err)
            }
            Err(err) => {
                log::warn!("Cleanup end for {conversation_id} failed: {err}");
                Ok(())
            }
        }
    }

    /// End every tracked conversation concurrently. No single failure
    /// aborts the batch, and the set is cleared unconditionally.
    pub async fn end_all_active(&self) {
        let snapshot: Vec<String> = self.active.lock().unwrap().iter().cloned().collect();
        if snapshot.is_empty() {
            return;
        }
        log::info!("Ending {} tracked conversation(s)", snapshot.len());
        join_all(
            snapshot
                .iter()
                .map(|id| self.end_session(id, false)),
        )
        .await;
        self.active.lock().unwrap().clear();
    }

    /// Poll the authoritative remote status, mirroring it into the
    /// persisted record. A remote failure propagates without touching
    /// local state; a terminal status drops the id from local tracking.
    pub async fn get_status(&self, conversation_id: &str) -> Result<VideoStatus> {
        let status = self.client.get_conversation_status(conversation_id).await?;

        if let Err(e) = self
            .backend
            .set_video_status(conversation_id, status, Utc::now())
            .await
        {
            log::warn!("Failed to mirror status for {conversation_id}: {e}");
        }

        if matches!(status, VideoStatus::Ended | VideoStatus::Error) {
            self.active.lock().unwrap().remove(conversation_id);
            let mut current = self.current.lock().unwrap();
            if current.as_deref() == Some(conversation_id) {
                *current = None;
            }
        }

        Ok(status)
    }

    /// Poll until the conversation is joinable (or reaches a terminal
    /// state), bounded by the embed wait. On timeout the caller offers a
    /// retry.
    pub async fn wait_until_active(
        &self,
        conversation_id: &str,
        bound: Duration,
    ) -> Result<VideoStatus> {
        let deadline = tokio::time::Instant::now() + bound;
        loop {
            let status = self.get_status(conversation_id).await?;
            match status {
                VideoStatus::Active | VideoStatus::Ended | VideoStatus::Error => {
                    return Ok(status)
                }
                VideoStatus::Pending => {}
            }
            if tokio::time::Instant::now() >= deadline {
                log::warn!("Conversation {conversation_id} not active within {bound:?}");
                return Err(Error::Timeout(bound));
            }
            tokio::time::sleep(STATUS_POLL_INTERVAL).await;
        }
    }
}

/// The service reports its concurrency cap as a plain error message; match
/// loosely so a reworded message still gets the friendlier treatment.
fn is_concurrency_limit(err: &Error) -> bool {
    match err {
        Error::RemoteCall { body, .. } => {
            let body = body.to_lowercase();
            body.contains("concurrent") || body.contains("maximum conversations")
        }
        _ => false,
    }
}
