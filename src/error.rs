//! Error types for the avatar subsystem.

/// Top-level error type for the conversational avatar subsystem.
#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    /// No speech-recognition capability is available on this platform.
    ///
    /// Non-retryable; surfaced immediately on `start()` rather than
    /// degrading to a silent no-op.
    #[error("speech recognition is not supported on this platform")]
    Unsupported,

    /// `start()` was called while a recognition session was already active.
    #[error("speech recognition is already listening")]
    AlreadyListening,

    /// Transient speech-recognition failure.
    #[error("recognition error: {0}")]
    Recognition(String),

    /// Speech-synthesis backend failure.
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Text-generation collaborator failure (transport, non-2xx status,
    /// or malformed response body).
    #[error("request error: {0}")]
    Request(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Channel send/receive error.
    #[error("channel error: {0}")]
    Channel(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AvatarError>;
