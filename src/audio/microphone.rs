// Microphone capture backend using cpal

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::capture::{AudioFrame, CaptureBackend, CaptureConfig};

/// Microphone capture backend
///
/// Owns a dedicated thread for the cpal input stream (cpal streams are not
/// `Send`). Device samples are downmixed to mono, decimated to the target
/// rate, and delivered as fixed-size frames.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    stop_flag: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    capturing: bool,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            stop_flag: Arc::new(AtomicBool::new(false)),
            thread: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        let (tx, rx) = mpsc::channel(64);
        let (ready_tx, ready_rx) = oneshot::channel();
        let stop_flag = Arc::new(AtomicBool::new(false));

        let config = self.config.clone();
        let thread_stop = Arc::clone(&stop_flag);
        let thread = std::thread::Builder::new()
            .name("mic-capture".to_string())
            .spawn(move || run_input_stream(config, tx, ready_tx, thread_stop))
            .context("Failed to spawn capture thread")?;

        // The thread reports whether the device opened before we hand the
        // receiver back.
        ready_rx
            .await
            .context("Capture thread exited before opening the device")??;

        self.stop_flag = stop_flag;
        self.thread = Some(thread);
        self.capturing = true;

        info!("Microphone capture started");

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }

        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(thread) = self.thread.take() {
            let _ = tokio::task::spawn_blocking(move || thread.join()).await;
        }

        self.capturing = false;
        info!("Microphone capture stopped");

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Accumulates device samples into outgoing frames.
struct FrameAssembler {
    device_channels: usize,
    /// Decimation step (device rate / target rate)
    step: usize,
    frame_len: usize,
    target_rate: u32,
    pos_in_step: usize,
    emitted: u64,
    pending: Vec<f32>,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameAssembler {
    fn new(config: &CaptureConfig, device_rate: u32, device_channels: usize, tx: mpsc::Sender<AudioFrame>) -> Self {
        let step = (device_rate / config.sample_rate).max(1) as usize;
        if device_rate % config.sample_rate != 0 {
            warn!(
                "Device rate {}Hz is not a multiple of target {}Hz; decimation will drift",
                device_rate, config.sample_rate
            );
        }
        Self {
            device_channels: device_channels.max(1),
            step,
            frame_len: config.samples_per_frame().max(1),
            target_rate: config.sample_rate,
            pos_in_step: 0,
            emitted: 0,
            pending: Vec::with_capacity(config.samples_per_frame().max(1)),
            tx,
        }
    }

    fn push_interleaved(&mut self, data: &[f32]) {
        for group in data.chunks(self.device_channels) {
            if self.pos_in_step == 0 {
                let mono = group.iter().sum::<f32>() / group.len() as f32;
                self.pending.push(mono);

                if self.pending.len() >= self.frame_len {
                    let samples =
                        std::mem::replace(&mut self.pending, Vec::with_capacity(self.frame_len));
                    let timestamp_ms = self.emitted * 1000 / self.target_rate as u64;
                    self.emitted += samples.len() as u64;

                    let frame = AudioFrame {
                        samples,
                        sample_rate: self.target_rate,
                        channels: 1,
                        timestamp_ms,
                    };

                    // Capture must never block; if the consumer is behind,
                    // the frame is dropped here.
                    if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(frame) {
                        warn!("Capture queue full; dropping frame");
                    }
                }
            }
            self.pos_in_step = (self.pos_in_step + 1) % self.step;
        }
    }
}

fn run_input_stream(
    config: CaptureConfig,
    tx: mpsc::Sender<AudioFrame>,
    ready: oneshot::Sender<Result<()>>,
    stop: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(anyhow::anyhow!("No input device available")));
            return;
        }
    };

    let supported = match device.default_input_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready.send(Err(anyhow::anyhow!("No default input config: {}", e)));
            return;
        }
    };

    let device_rate = supported.sample_rate();
    let device_channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    let mut assembler = FrameAssembler::new(&config, device_rate, device_channels, tx);
    let err_fn = |e: cpal::StreamError| error!("Input stream error: {}", e);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| assembler.push_interleaved(data),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                assembler.push_interleaved(&converted);
            },
            err_fn,
            None,
        ),
        other => {
            let _ = ready.send(Err(anyhow::anyhow!(
                "Unsupported input sample format: {:?}",
                other
            )));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(anyhow::anyhow!("Failed to open input stream: {}", e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(anyhow::anyhow!("Failed to start input stream: {}", e)));
        return;
    }

    let _ = ready.send(Ok(()));

    info!(
        "Input stream open: {}Hz, {} channels, {:?}",
        device_rate, device_channels, sample_format
    );

    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }

    drop(stream);
}
