//! User-facing notification payloads — the toast-equivalent surface.
//!
//! The core never renders anything; it hands these to the embedding UI
//! over a channel and moves on. Sends are fire-and-forget: a UI that has
//! gone away must not stall the engine.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A transient, non-technical message for the user.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub timestamp: DateTime<Utc>,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NoticeLevel::Info,
            timestamp: Utc::now(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            level: NoticeLevel::Error,
            timestamp: Utc::now(),
        }
    }
}

/// Channel half the core components hold for emitting notices.
pub type NoticeSender = mpsc::UnboundedSender<Notice>;

/// Channel half the embedding UI drains.
pub type NoticeReceiver = mpsc::UnboundedReceiver<Notice>;
