//! Bidirectional stream to the remote speech-translation service
//!
//! The transport is opaque to the rest of the crate: a channel accepts a
//! one-time session setup plus encoded audio frames, and emits an ordered
//! event stream (`Opened`, audio chunks, transcripts, turn markers,
//! interruptions, faults, `Closed`).

pub mod duplex;
pub mod messages;
pub mod nats;

pub use duplex::{
    ChannelEvent, ChannelSetup, ChannelStreams, DuplexChannel, FrameSender, InboundAudioChunk,
    TranscriptSide,
};
pub use messages::{AudioFrameMessage, RelayEventMessage, SessionSetupMessage};
pub use nats::NatsChannel;
