// engine.rs — Orchestrates one chat turn end to end: capture an image
// opportunistically, persist the user turn, call the model, reconcile the
// streamed reply into the in-memory transcript, persist the result.
//
// The engine owns the ordered in-memory turn list the UI renders from and
// emits `ChatEvent`s as it mutates it. It is the only writer of the
// in-flight assistant turn it creates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::ai::{ChatRequest, ModelClient, VisualTurn, WireTurn};
use crate::capture::ImageCapture;
use crate::error::{Error, Result};
use crate::notify::Notice;
use crate::store::{ConversationStore, Role, Turn};

/// Fixed, non-technical fallback shown when a follow-up reply fails.
const FOLLOW_UP_FALLBACK: &str = "Sorry, I encountered an error. Please try again.";
/// Fixed fallback for a failed first-look analysis.
const INITIAL_FALLBACK: &str = "Sorry, I couldn't get a good look just now. Please try again.";

/// Emitted as the engine mutates the transcript. The UI applies these (or
/// just re-reads [`ChatStreamEngine::turns`]) to stay current.
#[derive(Debug, Clone)]
pub enum ChatEvent {
    TurnAdded(Turn),
    TurnUpdated { id: u64, content: String },
    TurnCompleted { id: u64 },
    Notice(Notice),
}

pub struct ChatStreamEngine {
    store: Arc<ConversationStore>,
    model: Arc<dyn ModelClient>,
    camera: Option<ImageCapture>,
    model_name: String,
    transcript: Mutex<Vec<Turn>>,
    current_session: Mutex<Option<String>>,
    busy: AtomicBool,
    events: mpsc::UnboundedSender<ChatEvent>,
}

impl ChatStreamEngine {
    /// Build an engine and the event stream the embedding UI drains.
    pub fn new(
        store: Arc<ConversationStore>,
        model: Arc<dyn ModelClient>,
        camera: Option<ImageCapture>,
        model_name: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            Self {
                store,
                model,
                camera,
                model_name: model_name.into(),
                transcript: Mutex::new(Vec::new()),
                current_session: Mutex::new(None),
                busy: AtomicBool::new(false),
                events,
            },
            rx,
        )
    }

    /// Snapshot of the in-memory transcript, in display order.
    pub fn turns(&self) -> Vec<Turn> {
        self.transcript.lock().unwrap().clone()
    }

    pub fn current_session(&self) -> Option<String> {
        self.current_session.lock().unwrap().clone()
    }

    /// Whether a send is in flight. The UI disables the send affordance
    /// while this is set.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Replay a persisted session into the in-memory transcript.
    pub async fn select_session(&self, session_id: &str) {
        let turns = self.store.list_turns(session_id).await;
        *self.current_session.lock().unwrap() = Some(session_id.to_string());
        *self.transcript.lock().unwrap() = turns;
        log::info!("Loaded session {session_id}");
    }

    /// Drop the current session pointer and transcript (a fresh chat).
    pub fn clear_session(&self) {
        *self.current_session.lock().unwrap() = None;
        self.transcript.lock().unwrap().clear();
    }

    /// Delete a persisted session; clears local state when it was active.
    pub async fn delete_session(&self, session_id: &str) {
        self.store.delete_session(session_id).await;
        let was_current = {
            let mut current = self.current_session.lock().unwrap();
            if current.as_deref() == Some(session_id) {
                *current = None;
                true
            } else {
                false
            }
        };
        if was_current {
            self.transcript.lock().unwrap().clear();
        }
    }

    /// Send one user turn and stream the assistant's reply.
    ///
    /// When `image` is `None` a frame is captured opportunistically; a
    /// capture miss downgrades the turn to text-only, it is never an
    /// error. Not re-entrant: a second call while one is in flight fails
    /// fast with [`Error::Busy`].
    pub async fn send_turn(
        &self,
        text: &str,
        image: Option<String>,
        temperature: f32,
    ) -> Result<()> {
        let text = text.trim().to_string();
        if text.is_empty() {
            self.notify_error("Type or say something first.");
            return Err(Error::EmptyInput);
        }

        let _busy = BusyGuard::acquire(&self.busy)?;

        // 1. Image resolution.
        let image = match image {
            Some(img) => Some(img),
            None => self.camera.as_ref().and_then(|c| c.capture()),
        };

        // 2. Session resolution. On failure nothing has been shown or
        // written yet, and it stays that way.
        let session_id = match self.current_session() {
            Some(id) => id,
            None => match self.store.create_session(None).await {
                Some(id) => {
                    *self.current_session.lock().unwrap() = Some(id.clone());
                    id
                }
                None => {
                    self.notify_error("Couldn't start a new conversation. Please try again.");
                    return Err(Error::SessionCreation);
                }
            },
        };

        // 3. Optimistic insert, before any network I/O.
        let user_turn = Turn::user(self.store.next_turn_id(), &text, image.clone());
        self.push_turn(user_turn);

        // 4. Persist the user turn. On failure the optimistic entry stays
        // visible, but unsynced history is never sent to the model.
        if !self
            .store
            .append_turn(&session_id, Role::User, &text, image.as_deref())
            .await
        {
            self.append_fallback_turn(FOLLOW_UP_FALLBACK);
            self.notify_error("Couldn't save your message.");
            return Err(Error::Persistence);
        }

        // 5. Reload the persisted history; it, not the in-memory list, is
        // the authoritative visual record.
        let history = self.store.list_turns(&session_id).await;

        // 6. Build the request.
        let visual_context = latest_visual_context(&history);
        let first_turn = history.len() <= 1;
        let request = ChatRequest {
            messages: self.turns().iter().map(WireTurn::from).collect(),
            temperature,
            model: self.model_name.clone(),
            image,
            visual_context,
            visual_history: history.iter().map(VisualTurn::from).collect(),
        };

        if first_turn {
            self.run_analysis(&session_id, &request).await
        } else {
            self.run_streaming(&session_id, &request).await
        }
    }

    /// First turn of a session: single-shot analysis reply, which may
    /// carry a fresh visual-context description to remember.
    async fn run_analysis(&self, session_id: &str, request: &ChatRequest) -> Result<()> {
        let reply = match self.model.analyze(request).await {
            Ok(reply) => reply,
            Err(err) => {
                log::error!("First-look analysis failed: {err}");
                self.append_fallback_turn(INITIAL_FALLBACK);
                self.notify_error("The stylist couldn't respond. Please try again.");
                return Err(err);
            }
        };

        if reply.response.is_empty() {
            log::warn!("Analysis returned no text, nothing to show or persist");
            return Ok(());
        }

        let turn = Turn::assistant(
            self.store.next_turn_id(),
            &reply.response,
            reply.visual_context.clone(),
        );
        self.push_turn(turn);

        if !self
            .store
            .append_turn(
                session_id,
                Role::Assistant,
                &reply.response,
                reply.visual_context.as_deref(),
            )
            .await
        {
            self.notify_error("Couldn't save the reply.");
            return Err(Error::Persistence);
        }
        Ok(())
    }

    /// Follow-up turn: stream the reply into a placeholder, fragment by
    /// fragment, then persist the final text.
    async fn run_streaming(&self, session_id: &str, request: &ChatRequest) -> Result<()> {
        let mut stream = match self.model.stream_chat(request).await {
            Ok(stream) => stream,
            Err(err) => {
                log::error!("Model call failed: {err}");
                self.append_fallback_turn(FOLLOW_UP_FALLBACK);
                self.notify_error("The stylist couldn't respond. Please try again.");
                return Err(err);
            }
        };

        // 7. Placeholder goes in before the first fragment so the reply
        // bubble appears immediately. It is addressed by local id from
        // here on — the list may grow underneath it.
        let placeholder_id = self.store.next_turn_id();
        self.push_turn(Turn::assistant_placeholder(placeholder_id));

        let mut buffer = String::new();
        loop {
            match stream.next_fragment().await {
                Some(Ok(fragment)) => {
                    buffer.push_str(&fragment);
                    self.update_turn(placeholder_id, &buffer);
                }
                Some(Err(err)) => {
                    log::error!("Reply stream failed: {err}");
                    self.replace_with_fallback(placeholder_id, FOLLOW_UP_FALLBACK);
                    self.notify_error("The stylist couldn't respond. Please try again.");
                    return Err(err);
                }
                None => break,
            }
        }

        // 8. Finalize. An empty reply is dropped, not persisted and not
        // left as a blank bubble.
        if buffer.is_empty() {
            log::warn!("Stream ended without content");
            self.remove_turn(placeholder_id);
            return Ok(());
        }
        self.complete_turn(placeholder_id);

        if !self
            .store
            .append_turn(session_id, Role::Assistant, &buffer, None)
            .await
        {
            // Phase-2 failure: the streamed content stays visible.
            self.notify_error("Couldn't save the reply.");
            return Err(Error::Persistence);
        }
        Ok(())
    }

    // ── Transcript mutation ─────────────────────────────────────────────

    fn push_turn(&self, turn: Turn) {
        self.transcript.lock().unwrap().push(turn.clone());
        let _ = self.events.send(ChatEvent::TurnAdded(turn));
    }

    fn update_turn(&self, id: u64, content: &str) {
        let mut transcript = self.transcript.lock().unwrap();
        if let Some(turn) = transcript.iter_mut().rfind(|t| t.id == id) {
            turn.content = content.to_string();
        }
        drop(transcript);
        let _ = self.events.send(ChatEvent::TurnUpdated {
            id,
            content: content.to_string(),
        });
    }

    fn complete_turn(&self, id: u64) {
        let mut transcript = self.transcript.lock().unwrap();
        if let Some(turn) = transcript.iter_mut().rfind(|t| t.id == id) {
            turn.complete = true;
        }
        drop(transcript);
        let _ = self.events.send(ChatEvent::TurnCompleted { id });
    }

    fn remove_turn(&self, id: u64) {
        self.transcript.lock().unwrap().retain(|t| t.id != id);
    }

    /// Turn a failed placeholder into the single visible error turn, or
    /// append one if the failure happened before the placeholder existed.
    fn replace_with_fallback(&self, id: u64, fallback: &str) {
        let replaced = {
            let mut transcript = self.transcript.lock().unwrap();
            match transcript.iter_mut().rfind(|t| t.id == id) {
                Some(turn) => {
                    turn.content = fallback.to_string();
                    turn.complete = true;
                    true
                }
                None => false,
            }
        };
        if replaced {
            let _ = self.events.send(ChatEvent::TurnUpdated {
                id,
                content: fallback.to_string(),
            });
            let _ = self.events.send(ChatEvent::TurnCompleted { id });
        } else {
            self.append_fallback_turn(fallback);
        }
    }

    fn append_fallback_turn(&self, fallback: &str) {
        let turn = Turn::assistant(self.store.next_turn_id(), fallback, None);
        self.push_turn(turn);
    }

    fn notify_error(&self, message: &str) {
        let _ = self.events.send(ChatEvent::Notice(Notice::error(message)));
    }
}

/// Most recent non-null visual context, scanning oldest → newest with
/// last-write-wins.
fn latest_visual_context(history: &[Turn]) -> Option<String> {
    history.iter().rev().find_map(|t| t.visual_context.clone())
}

/// Scoped hold on the engine's busy flag; released on drop no matter how
/// the send path exits.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| Error::Busy)?;
        Ok(Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn_with_context(id: u64, ctx: Option<&str>) -> Turn {
        Turn::user(id, "text", ctx.map(str::to_string))
    }

    #[test]
    fn latest_visual_context_is_last_write_wins() {
        let history = vec![
            turn_with_context(1, Some("blue jacket, glasses")),
            turn_with_context(2, None),
        ];
        assert_eq!(
            latest_visual_context(&history).as_deref(),
            Some("blue jacket, glasses")
        );

        let history = vec![
            turn_with_context(1, Some("blue jacket")),
            turn_with_context(2, Some("red scarf")),
            turn_with_context(3, None),
        ];
        assert_eq!(latest_visual_context(&history).as_deref(), Some("red scarf"));
    }

    #[test]
    fn latest_visual_context_absent_when_never_set() {
        let history = vec![turn_with_context(1, None), turn_with_context(2, None)];
        assert_eq!(latest_visual_context(&history), None);
    }

    #[test]
    fn busy_guard_is_exclusive_and_releases_on_drop() {
        let flag = AtomicBool::new(false);

        let guard = BusyGuard::acquire(&flag).expect("first acquire succeeds");
        assert!(matches!(BusyGuard::acquire(&flag), Err(Error::Busy)));
        drop(guard);

        assert!(BusyGuard::acquire(&flag).is_ok());
    }
}
