// Output-device playback sink using cpal

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use super::playback::{PlaybackSink, ScheduledUnit};

/// Playback sink backed by the default output device.
///
/// A dedicated thread owns the cpal stream (cpal streams are not `Send`) and
/// drains a shared sample queue; the output callback writes silence when the
/// queue is empty, so contiguous units play back-to-back with no gap.
pub struct DevicePlaybackSink {
    sample_rate: u32,
    queue: Arc<Mutex<VecDeque<f32>>>,
    state: Mutex<Option<DeviceState>>,
}

struct DeviceState {
    stop: Arc<AtomicBool>,
    thread: Option<std::thread::JoinHandle<()>>,
    device_rate: u32,
}

impl DevicePlaybackSink {
    /// `sample_rate` is the rate of the units this sink will receive
    /// (the relay's synthesis rate, e.g. 24 kHz).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            queue: Arc::new(Mutex::new(VecDeque::new())),
            state: Mutex::new(None),
        }
    }
}

#[async_trait::async_trait]
impl PlaybackSink for DevicePlaybackSink {
    async fn open(&self) -> Result<()> {
        if self.state.lock().unwrap().is_some() {
            return Ok(());
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        let stop = Arc::new(AtomicBool::new(false));
        let queue = Arc::clone(&self.queue);
        let thread_stop = Arc::clone(&stop);

        let thread = std::thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || run_output_stream(queue, ready_tx, thread_stop))
            .context("Failed to spawn playback thread")?;

        let device_rate = ready_rx
            .await
            .context("Playback thread exited before opening the device")??;

        *self.state.lock().unwrap() = Some(DeviceState {
            stop,
            thread: Some(thread),
            device_rate,
        });

        info!("Output device open at {}Hz", device_rate);
        Ok(())
    }

    async fn play(&self, unit: &ScheduledUnit, samples: &[f32], sample_rate: u32) -> Result<()> {
        let device_rate = {
            let state = self.state.lock().unwrap();
            state
                .as_ref()
                .context("Playback sink is not open")?
                .device_rate
        };

        // Upsample by repetition (24kHz -> 48kHz and similar ratios).
        let repeat = (device_rate / sample_rate.max(1)).max(1) as usize;
        if device_rate % sample_rate.max(1) != 0 {
            warn!(
                "Unit {}: device rate {}Hz not a multiple of {}Hz; playback will drift",
                unit.id, device_rate, sample_rate
            );
        }

        let mut queue = self.queue.lock().unwrap();
        for &sample in samples {
            for _ in 0..repeat {
                queue.push_back(sample);
            }
        }

        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.queue.lock().unwrap().clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let state = self.state.lock().unwrap().take();
        if let Some(mut state) = state {
            state.stop.store(true, Ordering::SeqCst);
            if let Some(thread) = state.thread.take() {
                let _ = tokio::task::spawn_blocking(move || thread.join()).await;
            }
            self.queue.lock().unwrap().clear();
            info!("Output device closed");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "device"
    }
}

fn run_output_stream(
    queue: Arc<Mutex<VecDeque<f32>>>,
    ready: oneshot::Sender<Result<u32>>,
    stop: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready.send(Err(anyhow::anyhow!("No output device available")));
            return;
        }
    };

    let supported = match device.default_output_config() {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready.send(Err(anyhow::anyhow!("No default output config: {}", e)));
            return;
        }
    };

    let device_rate = supported.sample_rate();
    let channels = supported.channels() as usize;
    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();

    let err_fn = |e: cpal::StreamError| error!("Output stream error: {}", e);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => {
            let queue = Arc::clone(&queue);
            device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = queue.lock().unwrap();
                    for group in data.chunks_mut(channels.max(1)) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        for slot in group {
                            *slot = sample;
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        cpal::SampleFormat::I16 => {
            let queue = Arc::clone(&queue);
            device.build_output_stream(
                &stream_config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let mut queue = queue.lock().unwrap();
                    for group in data.chunks_mut(channels.max(1)) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                        for slot in group {
                            *slot = quantized;
                        }
                    }
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(anyhow::anyhow!(
                "Unsupported output sample format: {:?}",
                other
            )));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(anyhow::anyhow!("Failed to open output stream: {}", e)));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(anyhow::anyhow!("Failed to start output stream: {}", e)));
        return;
    }

    let _ = ready.send(Ok(device_rate));

    while !stop.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(10));
    }

    drop(stream);
}
