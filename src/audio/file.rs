// WAV file capture backend (testing/batch processing)

use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::capture::{AudioFrame, CaptureBackend, CaptureConfig};

/// Capture backend that streams a WAV file as if it were a live microphone.
///
/// Frames are paced in real time so downstream timing behaves the way it does
/// with a device source.
pub struct FileCaptureBackend {
    path: PathBuf,
    config: CaptureConfig,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl FileCaptureBackend {
    pub fn new(path: PathBuf, config: CaptureConfig) -> Self {
        Self {
            path,
            config,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for FileCaptureBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        let samples = load_mono_samples(&self.path, &self.config)?;
        let duration_secs = samples.len() as f64 / self.config.sample_rate as f64;
        info!(
            "File capture source loaded: {} ({:.1}s at {}Hz)",
            self.path.display(),
            duration_secs,
            self.config.sample_rate
        );

        let (tx, rx) = mpsc::channel(64);
        let frame_len = self.config.samples_per_frame().max(1);
        let frame_interval = Duration::from_millis(self.config.frame_duration_ms.max(1));
        let sample_rate = self.config.sample_rate;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_interval);
            let mut offset = 0;
            let mut timestamp_ms = 0u64;

            while offset < samples.len() {
                ticker.tick().await;

                let end = (offset + frame_len).min(samples.len());
                let frame = AudioFrame {
                    samples: samples[offset..end].to_vec(),
                    sample_rate,
                    channels: 1,
                    timestamp_ms,
                };
                timestamp_ms += (end - offset) as u64 * 1000 / sample_rate as u64;
                offset = end;

                if tx.send(frame).await.is_err() {
                    break;
                }
            }

            info!("File capture source drained");
        });

        self.task = Some(task);
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;

        info!("File capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// Read a WAV file as mono float samples at the configured capture rate.
fn load_mono_samples(path: &PathBuf, config: &CaptureConfig) -> Result<Vec<f32>> {
    let reader = WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;
    let spec = reader.spec();

    let raw: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?,
    };

    let mono: Vec<f32> = if spec.channels > 1 {
        raw.chunks(spec.channels as usize)
            .map(|group| group.iter().sum::<f32>() / group.len() as f32)
            .collect()
    } else {
        raw
    };

    if spec.sample_rate < config.sample_rate {
        bail!(
            "Cannot upsample {}Hz file to {}Hz capture rate",
            spec.sample_rate,
            config.sample_rate
        );
    }
    let step = (spec.sample_rate / config.sample_rate).max(1) as usize;
    if spec.sample_rate % config.sample_rate != 0 {
        warn!(
            "File rate {}Hz is not a multiple of capture rate {}Hz; decimation will drift",
            spec.sample_rate, config.sample_rate
        );
    }

    Ok(mono.into_iter().step_by(step).collect())
}
