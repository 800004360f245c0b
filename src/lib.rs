pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod session;

pub use audio::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
    DevicePlaybackSink, EncodedFrame, PlaybackScheduler, PlaybackSink, ScheduledUnit, WavFileSink,
};
pub use channel::{
    ChannelEvent, ChannelSetup, ChannelStreams, DuplexChannel, FrameSender, InboundAudioChunk,
    NatsChannel, TranscriptSide,
};
pub use config::Config;
pub use error::{
    ConnectionError, ConnectionErrorKind, DecodeError, EncodeError, SessionError,
};
pub use http::{create_router, AppState};
pub use session::{
    ConnectionState, LiveSessionController, SessionConfig, SessionSnapshot, SessionStats,
    StartOptions, TranscriptAccumulator,
};
