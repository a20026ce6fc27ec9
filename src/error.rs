//! Error types for hublink.

use thiserror::Error;

use crate::transport::TransportError;

/// Main error type for all hub operations.
#[derive(Debug, Error)]
pub enum HubError {
    /// No handler registered under the invoked method name.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// A handler exists for the name but not for this argument count.
    #[error("method '{method}' has no overload taking {argc} argument(s)")]
    ArityMismatch { method: String, argc: usize },

    /// Argument decoding or validation failed before handler execution.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A unary or push handler failed during execution.
    #[error("handler faulted: {0}")]
    HandlerFaulted(String),

    /// A streaming channel terminated with an error.
    #[error("stream faulted: {0}")]
    StreamFaulted(String),

    /// Write attempted on a channel that was already completed.
    #[error("channel already completed")]
    ChannelCompleted,

    /// The invocation was cancelled before it could finish.
    #[error("invocation cancelled")]
    Cancelled,

    /// The connection (or its emitter) is gone.
    #[error("connection closed")]
    ConnectionClosed,

    /// Transport-level send/connection failure.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// MsgPack deserialization error.
    #[error("MsgPack decode error: {0}")]
    MsgPackDecode(#[from] rmp_serde::decode::Error),

    /// JSON value conversion error (argument binding).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using HubError.
pub type Result<T> = std::result::Result<T, HubError>;
