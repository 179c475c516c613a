//! In-memory [`StoreBackend`] — the deterministic twin of [`RestBackend`].
//!
//! Used by the test suite and by offline/demo embeddings. Failure
//! injection flags let tests exercise every error-swallowing branch of the
//! store façade without a network.
//!
//! [`RestBackend`]: crate::store::rest::RestBackend

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::store::backend::StoreBackend;
use crate::store::types::{MessageRow, SessionRow, VideoSessionRow, VideoStatus};

#[derive(Default)]
pub struct MemoryBackend {
    sessions: Mutex<Vec<SessionRow>>,
    messages: Mutex<Vec<MessageRow>>,
    video_sessions: Mutex<Vec<VideoSessionRow>>,
    fail_sessions: AtomicBool,
    fail_messages: AtomicBool,
    fail_video: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every session operation fail until reset.
    pub fn fail_sessions(&self, on: bool) {
        self.fail_sessions.store(on, Ordering::SeqCst);
    }

    /// Make every message operation fail until reset.
    pub fn fail_messages(&self, on: bool) {
        self.fail_messages.store(on, Ordering::SeqCst);
    }

    /// Make every video-session operation fail until reset.
    pub fn fail_video(&self, on: bool) {
        self.fail_video.store(on, Ordering::SeqCst);
    }

    /// Snapshot of the persisted message rows, in insertion order.
    pub fn message_rows(&self) -> Vec<MessageRow> {
        self.messages.lock().unwrap().clone()
    }

    /// Snapshot of the persisted video-session rows.
    pub fn video_rows(&self) -> Vec<VideoSessionRow> {
        self.video_sessions.lock().unwrap().clone()
    }

    fn check(&self, flag: &AtomicBool) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(Error::Connection("injected backend failure".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn insert_session(&self, row: &SessionRow) -> Result<()> {
        self.check(&self.fail_sessions)?;
        self.sessions.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn touch_session(&self, id: &str, at: DateTime<Utc>) -> Result<()> {
        self.check(&self.fail_sessions)?;
        let mut sessions = self.sessions.lock().unwrap();
        if let Some(s) = sessions.iter_mut().find(|s| s.id == id) {
            s.updated_at = at;
        }
        Ok(())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionRow>> {
        self.check(&self.fail_sessions)?;
        let mut rows = self.sessions.lock().unwrap().clone();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(rows)
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        self.check(&self.fail_sessions)?;
        self.sessions.lock().unwrap().retain(|s| s.id != id);
        self.messages.lock().unwrap().retain(|m| m.session_id != id);
        Ok(())
    }

    async fn insert_message(&self, row: &MessageRow) -> Result<()> {
        self.check(&self.fail_messages)?;
        self.messages.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRow>> {
        self.check(&self.fail_messages)?;
        let mut rows: Vec<MessageRow> = self
            .messages
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.session_id == session_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(rows)
    }

    async fn insert_video_session(&self, row: &VideoSessionRow) -> Result<()> {
        self.check(&self.fail_video)?;
        self.video_sessions.lock().unwrap().push(row.clone());
        Ok(())
    }

    async fn set_video_status(
        &self,
        conversation_id: &str,
        status: VideoStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        self.check(&self.fail_video)?;
        let mut rows = self.video_sessions.lock().unwrap();
        if let Some(r) = rows.iter_mut().find(|r| r.conversation_id == conversation_id) {
            r.status = status;
            r.updated_at = at;
        }
        Ok(())
    }
}
