use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised while encoding a captured audio frame for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("cannot encode an empty frame")]
    EmptyFrame,

    #[error("expected mono audio, got {0} channels")]
    UnsupportedChannels(u16),

    #[error("sample {0} is not a finite number")]
    NonFiniteSample(usize),
}

/// Error raised while decoding an inbound audio payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("payload is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("PCM payload has an odd byte length ({0})")]
    OddByteLength(usize),

    #[error("payload decodes to zero samples")]
    EmptyPayload,
}

/// Classification of a fault on the relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionErrorKind {
    /// Transport-level failure (connection refused, stream dropped)
    Transport,
    /// The relay rejected the session setup or a frame
    Rejected,
    /// A message from the relay could not be parsed
    Protocol,
    /// Fault reported by the remote inference service mid-stream
    Remote,
}

/// A fault description surfaced by the duplex channel.
///
/// Mid-stream faults are retryable: the controller tears the session down to
/// a clean state and the caller may start a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind:?}: {message}")]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
}

impl ConnectionError {
    pub fn new(kind: ConnectionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Transport, message)
    }

    pub fn remote(message: impl Into<String>) -> Self {
        Self::new(ConnectionErrorKind::Remote, message)
    }
}

/// Session-level error surfaced to the caller of the controller.
///
/// Every variant leaves the controller in a clean `Idle` state with no
/// microphone or playback resources held, so `start()` is always safe to
/// retry.
#[derive(Debug, Clone, Error)]
pub enum SessionError {
    /// Connecting to the relay failed or timed out.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Microphone or playback device unavailable.
    #[error("audio resource unavailable: {0}")]
    Resource(String),

    /// The channel reported a mid-stream fault.
    #[error(transparent)]
    Channel(#[from] ConnectionError),
}
