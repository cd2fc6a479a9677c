//! Text-generation collaborators.
//!
//! The conversation controller talks to exactly one [`ResponseGenerator`]
//! and treats it as opaque: one request in, one reply out, any failure is
//! recoverable. Shipped implementations live in [`api`] (HTTP clients)
//! and the inbound chat-completion endpoint lives in [`server`].

pub mod api;
pub mod server;

use crate::error::Result;
use async_trait::async_trait;

/// A text-generation collaborator.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// Generate the assistant reply for one user utterance.
    ///
    /// No timeout is enforced here; the transport owns it. Results that
    /// arrive after a stop or reset are discarded by the caller, never
    /// retried automatically.
    ///
    /// # Errors
    ///
    /// Any transport or provider failure.
    async fn generate(&self, text: &str) -> Result<String>;
}
