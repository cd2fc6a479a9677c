//! Turn-taking state machine for the avatar conversation.
//!
//! One controller owns one conversation session: the ordered message
//! history, the turn status, and the identity of the outstanding
//! text-generation request. It is the only component that calls the
//! text-generation collaborator.
//!
//! ## States
//!
//! `Idle → AwaitingResponse` on a send, `AwaitingResponse → Speaking` on
//! a successful reply, `Speaking → Idle` when playback ends, and back to
//! `Idle` on any failure, stop, or reset. Listening is tracked by the
//! speech input adapter, not here; it only gates sends at the UI level.
//!
//! ## Staleness
//!
//! Stop and reset bump the session epoch and clear the pending request
//! id. A collaborator completion applies its state changes only if both
//! still match, so a late reply can never resurrect a stopped or reset
//! conversation.

use crate::config::LipSyncConfig;
use crate::conversation::messages::{Message, PlaybackEvent, RecognitionEvent, UtteranceId};
use crate::error::Result;
use crate::llm::ResponseGenerator;
use crate::sentiment;
use crate::state::{AvatarStateStore, Emotion, StateUpdate};
use crate::tts::{SpeakOutcome, SpeechOutputAdapter};
use crate::viseme::{AnimationCue, AnimationSynchronizer};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Fixed reply appended when the text-generation collaborator fails.
pub const REQUEST_FAILURE_REPLY: &str = "Sorry, there was an error processing your request. \
                                         Please check your API endpoint or try again later.";

/// Greeting seeded into a fresh session.
pub const GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";

/// Cue channel capacity towards the rendering consumer.
const CUE_CHANNEL_SIZE: usize = 64;

/// Where the session is in the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No turn in progress.
    Idle,
    /// A text-generation request is outstanding.
    AwaitingResponse,
    /// The assistant reply is being spoken.
    Speaking,
}

/// How a [`ConversationController::send`] call was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The turn ran to completion (including the failure path).
    Dispatched,
    /// Empty or whitespace-only input; nothing happened.
    RejectedEmpty,
    /// A request was already outstanding; nothing happened.
    RejectedBusy,
}

struct ConversationSession {
    messages: Vec<Message>,
    status: SessionStatus,
    /// Identifier of the outstanding request, if any.
    pending: Option<Uuid>,
    /// Bumped by stop/reset; completions from an older epoch are stale.
    epoch: u64,
    /// Utterance whose `Ended` should return the session to `Idle`.
    speaking_utterance: Option<UtteranceId>,
}

impl ConversationSession {
    fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
            status: SessionStatus::Idle,
            pending: None,
            epoch: 0,
            speaking_utterance: None,
        }
    }
}

struct ControllerInner {
    store: AvatarStateStore,
    output: Arc<SpeechOutputAdapter>,
    generator: Arc<dyn ResponseGenerator>,
    synchronizer: AnimationSynchronizer,
    cues: mpsc::Sender<AnimationCue>,
    session: Mutex<ConversationSession>,
}

impl ControllerInner {
    fn session(&self) -> MutexGuard<'_, ConversationSession> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The conversation state machine. Cloning yields another handle to the
/// same session.
#[derive(Clone)]
pub struct ConversationController {
    inner: Arc<ControllerInner>,
}

impl ConversationController {
    /// Create a controller and the cue stream consumed by the rendering
    /// collaborator.
    #[must_use]
    pub fn new(
        store: AvatarStateStore,
        output: Arc<SpeechOutputAdapter>,
        generator: Arc<dyn ResponseGenerator>,
        lipsync: LipSyncConfig,
    ) -> (Self, mpsc::Receiver<AnimationCue>) {
        let (cue_tx, cue_rx) = mpsc::channel(CUE_CHANNEL_SIZE);
        let controller = Self {
            inner: Arc::new(ControllerInner {
                store,
                output,
                generator,
                synchronizer: AnimationSynchronizer::new(lipsync),
                cues: cue_tx,
                session: Mutex::new(ConversationSession::new()),
            }),
        };
        controller.spawn_playback_watcher();
        (controller, cue_rx)
    }

    /// Submit one user utterance, typed or transcribed.
    ///
    /// Rejected without side effects while a request is outstanding or
    /// when `text` is empty/whitespace. Otherwise the user message is
    /// appended, exactly one request goes to the collaborator, and on
    /// return the turn has fully resolved: reply appended, emotion set,
    /// playback started (or the failure placeholder appended). A stop or
    /// reset issued while the request was in flight makes its completion
    /// a no-op.
    pub async fn send(&self, text: &str) -> SendOutcome {
        let text = text.trim();
        if text.is_empty() {
            return SendOutcome::RejectedEmpty;
        }

        let (request_id, epoch) = {
            let mut session = self.inner.session();
            if session.status == SessionStatus::AwaitingResponse {
                debug!("send rejected: a request is already outstanding");
                return SendOutcome::RejectedBusy;
            }
            let request_id = Uuid::new_v4();
            session.messages.push(Message::user(text));
            session.status = SessionStatus::AwaitingResponse;
            session.pending = Some(request_id);
            (request_id, session.epoch)
        };

        info!("dispatching chat request {request_id}");
        let result = self.inner.generator.generate(text).await;
        self.complete(request_id, epoch, result);
        SendOutcome::Dispatched
    }

    /// Apply a collaborator completion, unless it has gone stale.
    fn complete(&self, request_id: Uuid, epoch: u64, result: Result<String>) {
        let mut session = self.inner.session();
        if session.epoch != epoch || session.pending != Some(request_id) {
            debug!("discarding stale completion for request {request_id}");
            return;
        }
        session.pending = None;

        match result {
            Ok(reply) => {
                session.messages.push(Message::assistant(reply.clone()));
                let emotion = sentiment::classify(&reply);
                self.inner.store.update(StateUpdate::new().emotion(emotion));

                // Subscribe before speaking so the driver sees Started.
                let events = self.inner.output.subscribe();
                match self.inner.output.speak(&reply) {
                    SpeakOutcome::Started(utterance) => {
                        session.status = SessionStatus::Speaking;
                        session.speaking_utterance = Some(utterance);
                        self.spawn_cue_driver(utterance, reply, events);
                    }
                    SpeakOutcome::Muted => {
                        session.status = SessionStatus::Idle;
                    }
                }
            }
            Err(e) => {
                warn!("chat request {request_id} failed: {e}");
                session.messages.push(Message::assistant(REQUEST_FAILURE_REPLY));
                self.inner
                    .store
                    .update(StateUpdate::new().emotion(Emotion::Sad));
                session.status = SessionStatus::Idle;
            }
        }
    }

    /// Stop speaking and discard the outstanding request, if any.
    ///
    /// Takes effect on the current tick: playback is cancelled, the
    /// avatar state stops speaking immediately, and any in-flight
    /// collaborator request is marked stale (it is not cancelled, its
    /// eventual completion is simply discarded).
    pub fn stop(&self) {
        let mut session = self.inner.session();
        session.epoch += 1;
        session.pending = None;
        session.speaking_utterance = None;
        session.status = SessionStatus::Idle;
        self.inner.output.cancel();
        self.inner
            .store
            .update(StateUpdate::new().speaking(false).utterance(""));
    }

    /// Start a new conversation: empty the history, stop playback, and
    /// reset the avatar to defaults. Any outstanding request goes stale.
    pub fn reset(&self) {
        let mut session = self.inner.session();
        session.messages.clear();
        session.epoch += 1;
        session.pending = None;
        session.speaking_utterance = None;
        session.status = SessionStatus::Idle;
        self.inner.output.cancel();
        self.inner.store.reset();
    }

    /// Snapshot of the message history in display order.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner.session().messages.clone()
    }

    /// Where the session is in the current turn.
    #[must_use]
    pub fn status(&self) -> SessionStatus {
        self.inner.session().status
    }

    /// Forward finalized transcripts from a speech-input event stream
    /// into the conversation until the stream closes.
    ///
    /// Recognition errors reset the listening indicator upstream and are
    /// deliberately not surfaced into the conversation log.
    pub async fn pump_recognition(&self, mut events: mpsc::UnboundedReceiver<RecognitionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                RecognitionEvent::Transcript(text) => {
                    let _ = self.send(&text).await;
                }
                RecognitionEvent::Error(reason) => {
                    debug!("recognition error, not added to conversation: {reason}");
                }
                RecognitionEvent::Ended => {}
            }
        }
    }

    /// Watch playback `Ended` events and return the session to `Idle`
    /// when the current utterance finishes.
    fn spawn_playback_watcher(&self) {
        let inner = Arc::downgrade(&self.inner);
        let mut events = self.inner.output.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(PlaybackEvent::Ended { utterance }) => {
                        let Some(inner) = inner.upgrade() else { return };
                        let mut session =
                            inner.session.lock().unwrap_or_else(|e| e.into_inner());
                        if session.speaking_utterance == Some(utterance) {
                            session.speaking_utterance = None;
                            // A newer send may already be awaiting its
                            // response; leave that turn alone.
                            if session.status == SessionStatus::Speaking {
                                session.status = SessionStatus::Idle;
                            }
                        }
                    }
                    Ok(PlaybackEvent::Started { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("playback watcher lagged, skipped {skipped} events");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });
    }

    /// Emit lip-sync cues for `utterance` until its playback ends.
    fn spawn_cue_driver(
        &self,
        utterance: UtteranceId,
        text: String,
        events: broadcast::Receiver<PlaybackEvent>,
    ) {
        let synchronizer = self.inner.synchronizer.clone();
        let cues = self.inner.cues.clone();
        tokio::spawn(async move {
            synchronizer.drive(utterance, &text, events, cues).await;
        });
    }
}
