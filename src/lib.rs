//! Mira: conversational avatar orchestration.
//!
//! Turns one user utterance (typed or spoken) into a coordinated turn:
//! dispatch to a text-generation collaborator, emotion classification of
//! the reply, speech playback, and lip-sync cues timed against that
//! playback, with immediate stop/new-conversation interruption and
//! discarding of stale collaborator results.
//!
//! # Architecture
//!
//! Components communicate over async channels and a shared
//! [`state::AvatarStateStore`]:
//! - **stt**: single-shot speech recognition behind a capability trait
//! - **llm**: text-generation collaborators (HTTP client + chat endpoint)
//! - **sentiment**: keyword-based emotion classification
//! - **tts**: speech playback with a `Started`/`Ended` lifecycle
//! - **viseme**: cyclic cue scheduling bounded by the playback lifecycle
//! - **conversation**: the turn-taking state machine owning the history

pub mod config;
pub mod conversation;
pub mod error;
pub mod llm;
pub mod prefs;
pub mod sentiment;
pub mod state;
pub mod stt;
pub mod tts;
pub mod viseme;

pub use config::AvatarConfig;
pub use conversation::{ConversationController, SendOutcome, SessionStatus};
pub use error::{AvatarError, Result};
pub use state::{AvatarState, AvatarStateStore, Emotion};
