pub mod capture;
pub mod device;
pub mod encoder;
pub mod file;
pub mod microphone;
pub mod playback;
pub mod scheduler;

pub use capture::{
    AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSource,
};
pub use device::DevicePlaybackSink;
pub use encoder::{decode, encode, EncodedFrame};
pub use file::FileCaptureBackend;
pub use microphone::MicrophoneBackend;
pub use playback::{PlaybackSink, ScheduledUnit, WavFileSink};
pub use scheduler::PlaybackScheduler;
