use serde::{Deserialize, Serialize};

use super::duplex::{ChannelEvent, InboundAudioChunk, TranscriptSide};
use crate::error::{ConnectionError, ConnectionErrorKind};

/// Session setup published once when the channel opens
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSetupMessage {
    pub session_id: String,
    pub system_instruction: String,
    pub source_language: String,
    pub target_language: String,
    /// Requested response modality; always "audio" for live translation
    pub response_modality: String,
    pub transcribe_input: bool,
    pub transcribe_output: bool,
    pub timestamp: String, // RFC3339 timestamp
}

/// Outbound audio frame published to the relay
#[derive(Debug, Serialize, Deserialize)]
pub struct AudioFrameMessage {
    pub session_id: String,
    pub sequence: u32,
    pub pcm: String, // Base64-encoded PCM bytes
    pub sample_rate: u32,
    #[serde(rename = "final")]
    pub final_frame: bool,
}

/// Event message received from the relay
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEventMessage {
    Opened,
    AudioChunk {
        turn_id: String,
        pcm: String,
        sample_rate: u32,
    },
    Transcript {
        side: TranscriptSide,
        text: String,
    },
    TurnComplete,
    Interrupted,
    Error {
        kind: ConnectionErrorKind,
        message: String,
    },
    Closed,
}

impl From<RelayEventMessage> for ChannelEvent {
    fn from(message: RelayEventMessage) -> Self {
        match message {
            RelayEventMessage::Opened => ChannelEvent::Opened,
            RelayEventMessage::AudioChunk {
                turn_id,
                pcm,
                sample_rate,
            } => ChannelEvent::AudioChunk(InboundAudioChunk {
                turn_id,
                pcm,
                sample_rate,
            }),
            RelayEventMessage::Transcript { side, text } => {
                ChannelEvent::PartialTranscript { side, text }
            }
            RelayEventMessage::TurnComplete => ChannelEvent::TurnComplete,
            RelayEventMessage::Interrupted => ChannelEvent::Interrupted,
            RelayEventMessage::Error { kind, message } => {
                ChannelEvent::Error(ConnectionError::new(kind, message))
            }
            RelayEventMessage::Closed => ChannelEvent::Closed,
        }
    }
}
