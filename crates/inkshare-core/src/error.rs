//! Error types.
//!
//! None of these ever escape a [`Canvas`](crate::Canvas) operation: the engine
//! logs them and degrades to a no-op for the event that produced them.

use thiserror::Error;

/// Transport errors reported by a [`MessageChannel`](crate::channel::MessageChannel).
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Transport unavailable")]
    Unavailable,
    #[error("Channel closed")]
    Closed,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons an inbound message was rejected at the reconciler boundary.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Message is not a JSON object")]
    NotAnObject,
    #[error("Missing message kind")]
    MissingKind,
    #[error("Unknown message kind: {0}")]
    UnknownKind(String),
    #[error("Malformed {kind} message: {source}")]
    Malformed {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Stroke has no points")]
    EmptyStroke,
    #[error("Stroke has no id")]
    MissingStrokeId,
}

/// Failure reported by a caller-supplied integration hook.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct HookError(pub String);

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),
}
