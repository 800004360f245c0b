use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of the live session controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No session; `start()` is accepted
    Idle,
    /// Microphone acquired, waiting for the relay to confirm the setup
    Connecting,
    /// Streaming in both directions
    Connected,
    /// Teardown in progress
    Closing,
    /// Previous session finished cleanly; `start()` is accepted
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Statistics about a live session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the session reached `Connected` (None when no session ran)
    pub started_at: Option<DateTime<Utc>>,

    /// Session duration in seconds
    pub duration_secs: f64,

    /// Captured frames pushed to the channel
    pub frames_sent: u64,

    /// Captured frames dropped because the channel could not accept them
    pub frames_dropped: u64,

    /// Inbound chunks bound to the playback timeline
    pub chunks_scheduled: u64,

    /// Inbound chunks dropped (undecodable or late)
    pub chunks_discarded: u64,

    /// Conversational turns completed
    pub turns_completed: u64,
}

/// Read model surfaced to the presentation layer
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub connection_state: ConnectionState,
    pub last_error: Option<String>,
    pub user_transcript: String,
    pub ai_transcript: String,
    pub stats: SessionStats,
}
