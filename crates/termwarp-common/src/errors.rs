use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Failures of the pseudoterminal session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The subprocess or its pseudoterminal could not be created. Fatal at startup.
    #[error("failed to spawn session: {0}")]
    Spawn(String),

    #[error("failed to resize pseudoterminal: {0}")]
    Resize(String),

    #[error("session write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("session is closed")]
    Closed,
}

/// Delivery of a transcript entry to a single observer failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("observer disconnected")]
    Closed,

    #[error("observer fell behind")]
    Lagged,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("remote input queue is full (capacity {capacity})")]
    Full { capacity: usize },

    #[error("remote input queue is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum TerminalError {
    #[error("failed to enter raw mode: {0}")]
    EnterRaw(#[source] std::io::Error),

    #[error("failed to restore terminal mode: {0}")]
    Restore(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum WarpError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Terminal(#[from] TerminalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
