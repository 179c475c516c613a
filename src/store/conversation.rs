//! Conversation store façade — the single source of truth for persisted
//! sessions and turns.
//!
//! Deliberately forgiving API: reads degrade to empty results and writes
//! report success as a bool, so callers choose escalation policy (toast
//! vs. silent retry) instead of unwinding through every UI path.

use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::store::backend::StoreBackend;
use crate::store::types::{MessageRow, Role, Session, SessionRow, Turn};

pub struct ConversationStore {
    backend: Arc<dyn StoreBackend>,
    /// Process-local turn id allocator. Server row ids are separate.
    next_turn_id: AtomicU64,
}

impl ConversationStore {
    pub fn new(backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            backend,
            next_turn_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh local turn id.
    pub fn next_turn_id(&self) -> u64 {
        self.next_turn_id.fetch_add(1, Ordering::SeqCst)
    }

    /// All sessions, newest activity first. Empty on error.
    pub async fn list_sessions(&self) -> Vec<Session> {
        match self.backend.list_sessions().await {
            Ok(rows) => rows
                .into_iter()
                .map(|r| Session {
                    id: r.id,
                    title: r.title,
                    created_at: r.created_at,
                    updated_at: r.updated_at,
                })
                .collect(),
            Err(e) => {
                log::error!("Failed to list sessions: {e}");
                Vec::new()
            }
        }
    }

    /// Create a session, returning its id, or `None` on persistence error.
    pub async fn create_session(&self, title: Option<&str>) -> Option<String> {
        let now = Utc::now();
        let row = SessionRow {
            id: Uuid::new_v4().to_string(),
            title: title
                .map(str::to_string)
                .unwrap_or_else(|| format!("Styling session {}", now.format("%b %-d"))),
            user_id: None,
            created_at: now,
            updated_at: now,
        };
        match self.backend.insert_session(&row).await {
            Ok(()) => {
                log::info!("Created session {}", row.id);
                Some(row.id)
            }
            Err(e) => {
                log::error!("Failed to create session: {e}");
                None
            }
        }
    }

    /// A session's turns, oldest first. Empty on error so callers never
    /// need a null branch.
    pub async fn list_turns(&self, session_id: &str) -> Vec<Turn> {
        match self.backend.list_messages(session_id).await {
            Ok(rows) => rows
                .into_iter()
                .map(|r| Turn {
                    id: self.next_turn_id(),
                    role: r.role,
                    content: r.content,
                    visual_context: r.visual_context,
                    created_at: r.created_at,
                    complete: true,
                })
                .collect(),
            Err(e) => {
                log::error!("Failed to list turns for session {session_id}: {e}");
                Vec::new()
            }
        }
    }

    /// Append a turn and bump the session's `updated_at`. Returns false on
    /// failure without throwing.
    pub async fn append_turn(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        visual_context: Option<&str>,
    ) -> bool {
        let now = Utc::now();
        let row = MessageRow {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            content: content.to_string(),
            visual_context: visual_context.map(str::to_string),
            created_at: now,
        };
        if let Err(e) = self.backend.insert_message(&row).await {
            log::error!("Failed to append turn to session {session_id}: {e}");
            return false;
        }
        if let Err(e) = self.backend.touch_session(session_id, now).await {
            // The message row landed; a stale updated_at only degrades
            // session list ordering.
            log::warn!("Failed to bump updated_at for session {session_id}: {e}");
        }
        true
    }

    /// Best-effort delete. The caller is responsible for clearing its
    /// current-session pointer if this was the active session.
    pub async fn delete_session(&self, session_id: &str) {
        if let Err(e) = self.backend.delete_session(session_id).await {
            log::error!("Failed to delete session {session_id}: {e}");
        }
    }
}
