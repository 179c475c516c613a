// transcript.rs — Debounced end-of-turn detection over live speech
// recognition.
//
// The recognizer produces interim and finalized segments; the live
// transcript shown to the user is the concatenation of all finalized
// segments plus the current interim one. A turn ends when the transcript
// has been non-empty and unchanged for the silence window; the completed
// text is delivered exactly once, stays visible for a short display
// delay, then clears.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::notify::{Notice, NoticeSender};

/// Incremental output of a speech-recognition capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Provisional text for the segment currently being spoken. Replaces
    /// any previous interim segment.
    Interim(String),
    /// A segment the recognizer has finalized.
    Final(String),
    /// Recognition failed. User-initiated aborts arrive as [`RecognitionEvent::Aborted`].
    Error(String),
    /// The handle was torn down deliberately; not an error.
    Aborted,
}

/// Live speech recognition, injected explicitly.
#[async_trait]
pub trait SpeechRecognizer: Send {
    /// Next recognition event. `None` when the handle has closed.
    async fn next_event(&mut self) -> Option<RecognitionEvent>;

    /// Tear the recognition handle down.
    async fn abort(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptState {
    Idle,
    Listening,
    /// Turn delivered; transcript held on screen for the display delay.
    Debouncing,
}

pub struct TurnTranscriptSource {
    state: Arc<Mutex<TranscriptState>>,
    live: Arc<Mutex<String>>,
    stop_tx: Mutex<Option<mpsc::Sender<()>>>,
    cleanup_in_progress: AtomicBool,
    silence_timeout: Duration,
    clear_delay: Duration,
    notices: NoticeSender,
}

impl TurnTranscriptSource {
    pub fn new(silence_timeout: Duration, clear_delay: Duration, notices: NoticeSender) -> Self {
        Self {
            state: Arc::new(Mutex::new(TranscriptState::Idle)),
            live: Arc::new(Mutex::new(String::new())),
            stop_tx: Mutex::new(None),
            cleanup_in_progress: AtomicBool::new(false),
            silence_timeout,
            clear_delay,
            notices,
        }
    }

    pub fn state(&self) -> TranscriptState {
        *self.state.lock().unwrap()
    }

    /// The transcript as the user currently sees it.
    pub fn live_transcript(&self) -> String {
        self.live.lock().unwrap().clone()
    }

    /// Begin continuous listening. The completed turn transcript is
    /// delivered on `turn_tx` exactly once per detected turn.
    ///
    /// A `None` recognizer means the capability is unsupported on this
    /// device: a notice is emitted and the source stays idle. If a prior
    /// session is still listening it is stopped first.
    pub async fn start(
        &self,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        turn_tx: mpsc::UnboundedSender<String>,
    ) {
        let Some(mut recognizer) = recognizer else {
            log::warn!("Speech recognition unavailable, staying idle");
            let _ = self
                .notices
                .send(Notice::error("Speech input isn't supported on this device."));
            return;
        };

        if self.state() != TranscriptState::Idle {
            log::info!("Restarting transcript source: stopping prior session");
            self.stop().await;
            // Let the prior task finish its cleanup before re-arming, so
            // its final Idle write cannot clobber the new session's state.
            while self.state() != TranscriptState::Idle {
                tokio::task::yield_now().await;
            }
        }

        let (stop_sender, mut stop_rx) = mpsc::channel::<()>(1);
        *self.stop_tx.lock().unwrap() = Some(stop_sender);
        *self.state.lock().unwrap() = TranscriptState::Listening;

        let state = Arc::clone(&self.state);
        let live = Arc::clone(&self.live);
        let notices = self.notices.clone();
        let silence_timeout = self.silence_timeout;
        let clear_delay = self.clear_delay;

        tokio::spawn(async move {
            let mut finalized = String::new();
            let mut deadline: Option<Instant> = None;

            loop {
                // `move` copies the deadline so the event handlers below
                // stay free to re-arm it.
                let timer = async move {
                    match deadline {
                        Some(d) => tokio::time::sleep_until(d).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    _ = stop_rx.recv() => {
                        recognizer.abort().await;
                        live.lock().unwrap().clear();
                        *state.lock().unwrap() = TranscriptState::Idle;
                        return;
                    }

                    _ = timer => {
                        // Silence window elapsed: the turn is over.
                        *state.lock().unwrap() = TranscriptState::Debouncing;
                        recognizer.abort().await;

                        let transcript = live.lock().unwrap().clone();
                        log::info!("Turn ended ({} chars)", transcript.len());
                        let _ = turn_tx.send(transcript);

                        // Keep the captured text visible briefly before
                        // clearing; stop() still cuts this short.
                        tokio::select! {
                            _ = stop_rx.recv() => {}
                            _ = tokio::time::sleep(clear_delay) => {}
                        }
                        live.lock().unwrap().clear();
                        *state.lock().unwrap() = TranscriptState::Idle;
                        return;
                    }

                    event = recognizer.next_event() => {
                        match event {
                            Some(RecognitionEvent::Interim(segment)) => {
                                let updated = format!("{finalized}{segment}");
                                let changed = {
                                    let mut current = live.lock().unwrap();
                                    let changed = *current != updated;
                                    *current = updated;
                                    changed
                                };
                                if changed && !live.lock().unwrap().is_empty() {
                                    deadline = Some(Instant::now() + silence_timeout);
                                }
                            }
                            Some(RecognitionEvent::Final(segment)) => {
                                finalized.push_str(&segment);
                                let changed = {
                                    let mut current = live.lock().unwrap();
                                    let changed = *current != finalized;
                                    *current = finalized.clone();
                                    changed
                                };
                                if changed && !finalized.is_empty() {
                                    deadline = Some(Instant::now() + silence_timeout);
                                }
                            }
                            Some(RecognitionEvent::Error(message)) => {
                                log::error!("Speech recognition error: {message}");
                                let _ = notices.send(Notice::error(
                                    "Speech input hit a problem. Try again.",
                                ));
                                recognizer.abort().await;
                                live.lock().unwrap().clear();
                                *state.lock().unwrap() = TranscriptState::Idle;
                                return;
                            }
                            Some(RecognitionEvent::Aborted) | None => {
                                live.lock().unwrap().clear();
                                *state.lock().unwrap() = TranscriptState::Idle;
                                return;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Cancel timers and tear down the recognition handle. Idempotent and
    /// safe to call at any time; concurrent calls collapse into one
    /// cleanup pass.
    pub async fn stop(&self) {
        if self.cleanup_in_progress.swap(true, Ordering::SeqCst) {
            return;
        }
        let sender = self.stop_tx.lock().unwrap().take();
        if let Some(sender) = sender {
            // The task may already have exited on its own; a dead channel
            // is fine.
            let _ = sender.send(()).await;
        }
        self.cleanup_in_progress.store(false, Ordering::SeqCst);
    }
}
