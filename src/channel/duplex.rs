use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::audio::EncodedFrame;
use crate::error::ConnectionError;

/// Which side of the conversation a transcript fragment belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSide {
    /// What the user said
    User,
    /// What the translated voice said
    Ai,
}

/// One discrete slice of inbound synthesized audio, still wire-encoded.
#[derive(Debug, Clone)]
pub struct InboundAudioChunk {
    /// Opaque utterance identifier assigned by the remote service
    pub turn_id: String,
    /// Base64-encoded 16-bit PCM
    pub pcm: String,
    /// Sample rate of the synthesized audio in Hz
    pub sample_rate: u32,
}

/// Events delivered by the channel, in the order the remote service produced
/// them.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The remote service accepted the session setup
    Opened,
    /// A slice of synthesized translation audio
    AudioChunk(InboundAudioChunk),
    /// An incremental transcript fragment for one side
    PartialTranscript { side: TranscriptSide, text: String },
    /// The current conversational exchange finished
    TurnComplete,
    /// The user started speaking over in-progress playback; flush it
    Interrupted,
    /// Mid-stream fault
    Error(ConnectionError),
    /// The stream is finished; no further events follow
    Closed,
}

/// One-time session configuration sent when the channel opens.
#[derive(Debug, Clone)]
pub struct ChannelSetup {
    pub session_id: String,
    /// Free-form text steering the remote model
    pub system_instruction: String,
    /// BCP-47 tag of the language being spoken
    pub source_language: String,
    /// BCP-47 tag to translate into
    pub target_language: String,
    /// Request transcription of what the user says
    pub transcribe_input: bool,
    /// Request transcription of the synthesized reply
    pub transcribe_output: bool,
}

/// Fire-and-forget handle for outbound audio frames.
///
/// `send` never blocks: when the channel cannot keep up, the frame is dropped
/// and counted, preserving bounded capture latency over completeness.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<EncodedFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameSender {
    pub fn new(tx: mpsc::Sender<EncodedFrame>) -> Self {
        Self {
            tx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Enqueue a frame for transmission.
    pub fn send(&self, frame: EncodedFrame) {
        match self.tx.try_send(frame) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("Outbound queue full; dropping audio frame");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Channel closed; discarding audio frame");
            }
        }
    }

    /// Frames dropped because the channel could not accept them.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// The two halves of an open channel.
pub struct ChannelStreams {
    /// Outbound frame handle (cloneable)
    pub frames: FrameSender,
    /// Ordered inbound event stream
    pub events: mpsc::Receiver<ChannelEvent>,
}

/// Bidirectional stream to the remote speech-translation service.
///
/// Transport details live behind this trait; the controller only sees
/// connect/send/events/close.
#[async_trait::async_trait]
pub trait DuplexChannel: Send + Sync {
    /// Open the stream and deliver the session setup.
    ///
    /// Resolves once the transport is up; the remote service confirms with an
    /// `Opened` event on the returned stream.
    async fn connect(&mut self, setup: &ChannelSetup) -> Result<ChannelStreams, ConnectionError>;

    /// Terminate the stream and release the transport.
    ///
    /// Idempotent, and safe to call while a connect is still pending. After
    /// close, the event stream ends (a final `Closed` event is emitted when
    /// the receiver is still attached).
    async fn close(&mut self) -> anyhow::Result<()>;

    /// Get channel name for logging
    fn name(&self) -> &str;
}
