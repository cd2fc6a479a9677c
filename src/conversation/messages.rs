//! Message and event types passed between subsystem components.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Who authored a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

/// One entry in the conversation history.
///
/// Immutable once created. Appended in insertion order, which is also
/// display order; removed only when the whole session is reset.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    /// Opaque identifier.
    pub id: Uuid,
    /// Message text.
    pub text: String,
    /// Author.
    pub sender: Sender,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A user message created now.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    /// An assistant message created now.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Assistant)
    }

    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            created_at: Utc::now(),
        }
    }
}

/// Events emitted by the speech-recognition boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// A finalized single-utterance transcript.
    Transcript(String),
    /// Recognition failed. Transient; the conversation log is untouched.
    Error(String),
    /// Listening stopped, whether by completion, explicit stop, or error.
    /// Always emitted exactly once per started recognition session, so a
    /// consumer can reliably reset its listening indicator.
    Ended,
}

/// Identifier for one playback unit (one spoken assistant reply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

impl std::fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "utterance-{}", self.0)
    }
}

/// Lifecycle events emitted by the speech-synthesis boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Playback of the identified utterance began.
    Started { utterance: UtteranceId },
    /// Playback completed or was cancelled. Every `Started` is followed by
    /// exactly one `Ended` for the same utterance.
    Ended { utterance: UtteranceId },
}
