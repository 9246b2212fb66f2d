use thiserror::Error;

/// Errors surfaced by discovery, lifecycle operations and log streaming.
///
/// All of these are fatal to the triggering request only; the web layer
/// renders them as inline text and the sweep loops log them per iteration.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// An external listing could not be parsed as structured output.
    #[error("discovery failed: {0}")]
    Discovery(String),

    #[error("Unknown service {0}")]
    UnknownService(String),

    #[error("No url match found for {0}")]
    NoUrlMatch(String),

    /// The followed process ended with a non-zero exit code before any
    /// break condition matched.
    #[error("Exited with code {0}")]
    ProcessExit(i32),

    /// A fatal break pattern appeared in the stream backlog.
    #[error("matched fatal pattern {0:?} in output")]
    StreamBreak(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
