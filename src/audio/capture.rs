use anyhow::Result;
use std::time::Duration;
use tokio::sync::mpsc;

/// One discrete slice of captured audio.
///
/// Samples are mono floats in [-1, 1] at the capture rate. A frame is
/// immutable once produced; ownership moves from the capture source through
/// the encoder to the channel.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (f32, interleaved when channels > 1)
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Playing time of this frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 || self.channels == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(
            self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64),
        )
    }
}

/// Configuration for capture backends
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Target sample rate (will downsample if needed)
    pub sample_rate: u32,
    /// Target channel count (the relay expects mono)
    pub channels: u16,
    /// Size of each delivered frame in milliseconds (affects latency)
    pub frame_duration_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz capture rate expected by the relay
            channels: 1,        // Mono
            frame_duration_ms: 100,
        }
    }
}

impl CaptureConfig {
    /// Samples per delivered frame at the target rate.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.frame_duration_ms / 1000) as usize
            * self.channels as usize
    }
}

/// Capture backend trait
///
/// Implementations:
/// - Microphone: cpal input device (all platforms)
/// - File: read from a WAV file, paced in real time (batch/testing)
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that delivers fixed-size frames until the
    /// backend is stopped.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture source type
#[derive(Debug, Clone)]
pub enum CaptureSource {
    /// Microphone input
    Microphone,
    /// WAV file input (for testing/batch processing)
    File(String),
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create a capture backend for the given source.
    pub fn create(source: CaptureSource, config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        match source {
            CaptureSource::Microphone => {
                let backend = super::microphone::MicrophoneBackend::new(config);
                Ok(Box::new(backend))
            }
            CaptureSource::File(path) => {
                let backend = super::file::FileCaptureBackend::new(path.into(), config);
                Ok(Box::new(backend))
            }
        }
    }
}
