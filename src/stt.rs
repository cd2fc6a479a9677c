//! Speech input adapter over a platform recognition capability.
//!
//! Wraps whatever speech-to-text provider the platform offers behind the
//! [`RecognizerCapability`] trait so the conversation layer never touches
//! provider callbacks directly. Recognition is single-shot: one `start()`
//! captures at most one utterance, then the session ends. Every started
//! session terminates with [`RecognitionEvent::Ended`] regardless of how
//! it finished.

use crate::conversation::messages::RecognitionEvent;
use crate::error::{AvatarError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Whether a recognition capability is usable on this platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The provider can capture and transcribe speech.
    Available,
    /// No provider exists; every `start()` fails fast.
    Unsupported,
}

/// Platform speech-recognition provider behind the adapter.
///
/// One `recognize` call captures a single utterance. It resolves with
/// `Ok(Some(transcript))` on success, `Ok(None)` when cancelled before a
/// transcript was finalized, or an error.
#[async_trait]
pub trait RecognizerCapability: Send + Sync {
    /// Capability state, checked before every listening session.
    fn availability(&self) -> Availability;

    /// Capture and transcribe one utterance.
    ///
    /// # Errors
    ///
    /// Returns a recognition error when capture or transcription fails.
    async fn recognize(&self, cancel: CancellationToken) -> Result<Option<String>>;
}

/// Adapter exposing start/stop listening over a [`RecognizerCapability`].
pub struct SpeechInputAdapter {
    backend: Arc<dyn RecognizerCapability>,
    events: mpsc::UnboundedSender<RecognitionEvent>,
    listening: Arc<AtomicBool>,
    cancel: Mutex<CancellationToken>,
}

impl SpeechInputAdapter {
    /// Create the adapter and the receiving half of its event stream.
    #[must_use]
    pub fn new(
        backend: Arc<dyn RecognizerCapability>,
    ) -> (Self, mpsc::UnboundedReceiver<RecognitionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let adapter = Self {
            backend,
            events,
            listening: Arc::new(AtomicBool::new(false)),
            cancel: Mutex::new(CancellationToken::new()),
        };
        (adapter, rx)
    }

    /// Capability state of the wrapped provider.
    #[must_use]
    pub fn availability(&self) -> Availability {
        self.backend.availability()
    }

    /// Whether a listening session is active.
    #[must_use]
    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Begin capturing one utterance.
    ///
    /// On completion the event stream carries either
    /// [`RecognitionEvent::Transcript`] or [`RecognitionEvent::Error`],
    /// always followed by a terminal [`RecognitionEvent::Ended`].
    ///
    /// # Errors
    ///
    /// [`AvatarError::Unsupported`] when no provider exists, and
    /// [`AvatarError::AlreadyListening`] when a session is active.
    pub fn start(&self) -> Result<()> {
        if self.backend.availability() == Availability::Unsupported {
            return Err(AvatarError::Unsupported);
        }
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(AvatarError::AlreadyListening);
        }

        let token = CancellationToken::new();
        *self.cancel.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();

        let backend = Arc::clone(&self.backend);
        let events = self.events.clone();
        let listening = Arc::clone(&self.listening);
        tokio::spawn(async move {
            match backend.recognize(token).await {
                Ok(Some(transcript)) => {
                    let _ = events.send(RecognitionEvent::Transcript(transcript));
                }
                Ok(None) => {
                    // Cancelled before a transcript was finalized.
                }
                Err(e) => {
                    warn!("speech recognition failed: {e}");
                    let _ = events.send(RecognitionEvent::Error(e.to_string()));
                }
            }
            listening.store(false, Ordering::SeqCst);
            let _ = events.send(RecognitionEvent::Ended);
        });
        Ok(())
    }

    /// Stop listening. No-op when no session is active.
    pub fn stop(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

// ── Tests ───────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    /// Provider that resolves immediately with a fixed outcome.
    struct FixedRecognizer {
        availability: Availability,
        outcome: Result<Option<String>>,
    }

    #[async_trait]
    impl RecognizerCapability for FixedRecognizer {
        fn availability(&self) -> Availability {
            self.availability
        }

        async fn recognize(&self, _cancel: CancellationToken) -> Result<Option<String>> {
            match &self.outcome {
                Ok(t) => Ok(t.clone()),
                Err(e) => Err(AvatarError::Recognition(e.to_string())),
            }
        }
    }

    /// Provider that listens until cancelled.
    struct WaitingRecognizer;

    #[async_trait]
    impl RecognizerCapability for WaitingRecognizer {
        fn availability(&self) -> Availability {
            Availability::Available
        }

        async fn recognize(&self, cancel: CancellationToken) -> Result<Option<String>> {
            cancel.cancelled().await;
            Ok(None)
        }
    }

    #[tokio::test]
    async fn transcript_then_ended() {
        let backend = Arc::new(FixedRecognizer {
            availability: Availability::Available,
            outcome: Ok(Some("hello there".to_owned())),
        });
        let (adapter, mut events) = SpeechInputAdapter::new(backend);

        adapter.start().unwrap();
        assert_eq!(
            events.recv().await,
            Some(RecognitionEvent::Transcript("hello there".to_owned()))
        );
        assert_eq!(events.recv().await, Some(RecognitionEvent::Ended));
        assert!(!adapter.is_listening());
    }

    #[tokio::test]
    async fn unsupported_fails_fast_with_no_events() {
        let backend = Arc::new(FixedRecognizer {
            availability: Availability::Unsupported,
            outcome: Ok(None),
        });
        let (adapter, mut events) = SpeechInputAdapter::new(backend);

        assert!(matches!(adapter.start(), Err(AvatarError::Unsupported)));
        assert!(events.try_recv().is_err());
        assert!(!adapter.is_listening());
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_listening() {
        let (adapter, mut events) = SpeechInputAdapter::new(Arc::new(WaitingRecognizer));

        adapter.start().unwrap();
        assert!(adapter.is_listening());
        assert!(matches!(adapter.start(), Err(AvatarError::AlreadyListening)));

        adapter.stop();
        assert_eq!(events.recv().await, Some(RecognitionEvent::Ended));
        assert!(!adapter.is_listening());
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let (adapter, mut events) = SpeechInputAdapter::new(Arc::new(WaitingRecognizer));
        adapter.stop();
        adapter.stop();
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn recognition_error_emits_error_then_ended() {
        let backend = Arc::new(FixedRecognizer {
            availability: Availability::Available,
            outcome: Err(AvatarError::Recognition("microphone busy".to_owned())),
        });
        let (adapter, mut events) = SpeechInputAdapter::new(backend);

        adapter.start().unwrap();
        let first = events.recv().await.unwrap();
        assert!(matches!(first, RecognitionEvent::Error(_)));
        assert_eq!(events.recv().await, Some(RecognitionEvent::Ended));
    }

    #[tokio::test]
    async fn adapter_can_listen_again_after_a_session_ends() {
        let backend = Arc::new(FixedRecognizer {
            availability: Availability::Available,
            outcome: Ok(Some("again".to_owned())),
        });
        let (adapter, mut events) = SpeechInputAdapter::new(backend);

        adapter.start().unwrap();
        while events.recv().await != Some(RecognitionEvent::Ended) {}

        adapter.start().unwrap();
        assert_eq!(
            events.recv().await,
            Some(RecognitionEvent::Transcript("again".to_owned()))
        );
    }
}
