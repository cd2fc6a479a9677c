//! Speech output adapter over a synthesis backend.
//!
//! Wraps a platform text-to-speech provider behind the
//! [`SynthesizerBackend`] trait and enforces the playback contract: at
//! most one utterance plays at a time (a new `speak` cancels the old one,
//! there is no queue), `Started` is emitted synchronously when playback
//! is initiated, and every `Started` is followed by exactly one `Ended`,
//! whether playback completed, was cancelled, or the backend failed.
//!
//! The adapter owns the `speaking` side of the shared avatar state:
//! `Started` sets `speaking = true` together with the utterance text, and
//! `Ended` clears both in one atomic update, so no observer ever sees a
//! silent avatar with a stale utterance.

use crate::config::SpeechOptions;
use crate::conversation::messages::{PlaybackEvent, UtteranceId};
use crate::error::Result;
use crate::state::{AvatarStateStore, StateUpdate};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Voice names tried, in order, when no preferred voice is configured.
pub const DEFAULT_PREFERRED_VOICES: &[&str] = &["Google", "Female", "Samantha"];

/// Playback event channel capacity. Events are tiny; lagging consumers
/// drop the oldest.
const EVENT_CHANNEL_SIZE: usize = 32;

/// Platform speech-synthesis provider behind the adapter.
#[async_trait]
pub trait SynthesizerBackend: Send + Sync {
    /// Voice names offered by the provider, in provider order.
    fn voices(&self) -> Vec<String> {
        Vec::new()
    }

    /// Synthesize and play `text` to completion, or stop early when
    /// `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns a synthesis error when the provider fails. The adapter
    /// still emits `Ended` for the utterance.
    async fn synthesize(
        &self,
        text: &str,
        options: &SpeechOptions,
        cancel: CancellationToken,
    ) -> Result<()>;
}

/// Outcome of a [`SpeechOutputAdapter::speak`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakOutcome {
    /// Playback started; lifecycle events carry the returned id.
    Started(UtteranceId),
    /// Voice output is muted. Nothing was spoken and no lifecycle events
    /// were emitted.
    Muted,
}

struct CurrentUtterance {
    id: UtteranceId,
    cancel: CancellationToken,
}

/// Adapter exposing speak/cancel over a [`SynthesizerBackend`].
pub struct SpeechOutputAdapter {
    backend: Arc<dyn SynthesizerBackend>,
    options: SpeechOptions,
    store: AvatarStateStore,
    events: broadcast::Sender<PlaybackEvent>,
    enabled: AtomicBool,
    current: Arc<Mutex<CurrentUtterance>>,
    next_utterance: AtomicU64,
}

impl SpeechOutputAdapter {
    /// Create an adapter speaking through `backend` with `options`,
    /// reporting lifecycle state into `store`.
    #[must_use]
    pub fn new(
        backend: Arc<dyn SynthesizerBackend>,
        options: SpeechOptions,
        store: AvatarStateStore,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            backend,
            options,
            store,
            events,
            enabled: AtomicBool::new(true),
            current: Arc::new(Mutex::new(CurrentUtterance {
                id: UtteranceId(0),
                cancel: CancellationToken::new(),
            })),
            next_utterance: AtomicU64::new(1),
        }
    }

    /// Subscribe to playback lifecycle events.
    ///
    /// Subscribe before calling [`speak`](Self::speak) to observe the
    /// `Started` event of that utterance.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Enable or mute voice output. Muting cancels the current utterance.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.cancel();
        }
    }

    /// Whether voice output is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Speak `text`, cancelling any utterance still playing.
    ///
    /// Emits [`PlaybackEvent::Started`] and sets the speaking state before
    /// returning; the matching [`PlaybackEvent::Ended`] follows when
    /// playback completes, is cancelled, or the backend fails. When voice
    /// output is muted, returns [`SpeakOutcome::Muted`] without side
    /// effects.
    pub fn speak(&self, text: &str) -> SpeakOutcome {
        if !self.is_enabled() {
            debug!("voice output muted, skipping utterance");
            return SpeakOutcome::Muted;
        }

        // At most one utterance plays at a time.
        self.cancel();

        let id = UtteranceId(self.next_utterance.fetch_add(1, Ordering::SeqCst));
        let cancel = CancellationToken::new();
        {
            let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
            current.id = id;
            current.cancel = cancel.clone();
        }

        let mut options = self.options.clone();
        options.voice = select_voice(&self.backend.voices(), self.options.voice.as_deref());

        // Started is visible to subscribers and state observers before
        // speak() returns.
        self.store
            .update(StateUpdate::new().speaking(true).utterance(text));
        let _ = self.events.send(PlaybackEvent::Started { utterance: id });

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let store = self.store.clone();
        let current = Arc::clone(&self.current);
        let text = text.to_owned();
        tokio::spawn(async move {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => Ok(()),
                r = backend.synthesize(&text, &options, cancel.clone()) => r,
            };
            if let Err(e) = result {
                warn!("speech synthesis failed: {e}");
            }

            // Clear the speaking state only if no newer utterance has
            // taken over in the meantime.
            let still_current = {
                let current = current.lock().unwrap_or_else(|e| e.into_inner());
                current.id == id
            };
            if still_current {
                store.update(StateUpdate::new().speaking(false).utterance(""));
            }
            let _ = events.send(PlaybackEvent::Ended { utterance: id });
        });

        SpeakOutcome::Started(id)
    }

    /// Cancel the current utterance. Idempotent; no-op when idle.
    pub fn cancel(&self) {
        self.current
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel
            .cancel();
    }
}

/// Pick a concrete voice from `voices`.
///
/// An explicitly preferred voice is matched by case-insensitive name
/// substring; otherwise the first voice matching any of
/// [`DEFAULT_PREFERRED_VOICES`] wins. `None` means use the provider
/// default.
fn select_voice(voices: &[String], preferred: Option<&str>) -> Option<String> {
    if let Some(preferred) = preferred {
        let needle = preferred.to_lowercase();
        return voices
            .iter()
            .find(|voice| voice.to_lowercase().contains(&needle))
            .cloned();
    }
    voices
        .iter()
        .find(|voice| DEFAULT_PREFERRED_VOICES.iter().any(|p| voice.contains(p)))
        .cloned()
}

// ── Tests ───────────────────────────────────────────────────────────────
