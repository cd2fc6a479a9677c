//! Conversation orchestration.
//!
//! The state machine that turns one user utterance into a coordinated
//! turn across text generation, emotion classification, speech playback,
//! and lip-sync cue emission.

pub mod controller;
pub mod messages;

pub use controller::{ConversationController, SendOutcome, SessionStatus};
pub use messages::{Message, PlaybackEvent, RecognitionEvent, Sender, UtteranceId};
