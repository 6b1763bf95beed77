//! Error types for the real-time client.

use thiserror::Error;

/// Errors that can occur inside the real-time client.
///
/// None of these cross the subscribe/connect contract: the client turns them
/// into log lines and state transitions. Only config loading returns them.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// The endpoint URL could not be used.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The transport could not be established.
    #[error("connect failed: {0}")]
    Connect(String),

    /// A connect attempt did not complete in time.
    #[error("connect timed out after {0} ms")]
    ConnectTimeout(u64),

    /// The established transport failed while reading or writing.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound frame is not a usable envelope.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection was closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// `connect` was called outside a Tokio runtime.
    #[error("no tokio runtime available")]
    NoRuntime,

    /// Invalid or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for RealtimeError {
    fn from(err: config::ConfigError) -> Self {
        RealtimeError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for RealtimeError {
    fn from(err: validator::ValidationErrors) -> Self {
        RealtimeError::Config(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RealtimeError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        RealtimeError::Transport(err.to_string())
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RealtimeError>;
