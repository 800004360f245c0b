//! Live session orchestration
//!
//! This module provides the `LiveSessionController` that manages:
//! - Session lifecycle (idle → connecting → connected → closing → closed)
//! - Microphone capture wired through the frame encoder into the channel
//! - Dispatch of inbound events to playback scheduling and transcripts
//! - Barge-in handling and graceful teardown on faults

mod config;
mod controller;
mod state;
mod transcript;

pub use config::{SessionConfig, StartOptions};
pub use controller::LiveSessionController;
pub use state::{ConnectionState, SessionSnapshot, SessionStats};
pub use transcript::TranscriptAccumulator;
