use anyhow::{Context, Result};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A decoded inbound chunk bound to an absolute start offset on the playback
/// timeline.
///
/// Units live in the scheduler's pending set from `schedule` until they are
/// dispatched, completed, or flushed by an interruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledUnit {
    /// Monotonic unit id within one session
    pub id: u64,
    /// Opaque utterance identifier assigned by the remote service
    pub turn_id: String,
    /// Start offset from the timeline origin
    pub start_at: Duration,
    /// Playing time of the decoded samples
    pub duration: Duration,
}

/// Playback sink trait
///
/// Accepts scheduled buffers for playback. The sink plays each buffer exactly
/// once, in the order units are delivered; contiguous units play back-to-back
/// with no artificial gap. Delivery timing is owned by the scheduler.
///
/// Implementations:
/// - Device: cpal output device (all platforms)
/// - File: append to a WAV file (headless runs, batch processing)
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Acquire the output resource. Called by the scheduler before the first
    /// unit plays.
    async fn open(&self) -> Result<()>;

    /// Queue a unit's samples for playback. Returns once the samples are
    /// accepted, not once they have played.
    async fn play(&self, unit: &ScheduledUnit, samples: &[f32], sample_rate: u32) -> Result<()>;

    /// Drop everything queued or currently playing.
    async fn flush(&self) -> Result<()>;

    /// Release the output resource. Idempotent.
    async fn close(&self) -> Result<()>;

    /// Get sink name for logging
    fn name(&self) -> &str;
}

/// Playback sink that appends every played unit to a WAV file.
///
/// Interrupted audio is simply never written, so the file holds exactly what
/// a listener would have heard.
pub struct WavFileSink {
    path: PathBuf,
    sample_rate: u32,
    writer: Mutex<Option<hound::WavWriter<BufWriter<File>>>>,
}

impl WavFileSink {
    pub fn new(path: PathBuf, sample_rate: u32) -> Self {
        Self {
            path,
            sample_rate,
            writer: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl PlaybackSink for WavFileSink {
    async fn open(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap();
        if writer.is_some() {
            return Ok(());
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        *writer = Some(
            hound::WavWriter::create(&self.path, spec)
                .with_context(|| format!("Failed to create WAV file: {}", self.path.display()))?,
        );

        info!("WAV playback sink open: {}", self.path.display());
        Ok(())
    }

    async fn play(&self, unit: &ScheduledUnit, samples: &[f32], sample_rate: u32) -> Result<()> {
        if sample_rate != self.sample_rate {
            warn!(
                "Unit {} has rate {}Hz, sink expects {}Hz",
                unit.id, sample_rate, self.sample_rate
            );
        }

        let mut writer = self.writer.lock().unwrap();
        let writer = writer
            .as_mut()
            .context("WAV playback sink is not open")?;

        for &sample in samples {
            let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer
                .write_sample(quantized)
                .context("Failed to write sample to WAV")?;
        }

        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        // Nothing is queued; units are written as they are dispatched.
        debug!("WAV playback sink flush");
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(writer) = self.writer.lock().unwrap().take() {
            writer.finalize().context("Failed to finalize WAV file")?;
            info!("WAV playback sink closed: {}", self.path.display());
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
