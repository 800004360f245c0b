// Shared test doubles for the live-session components
#![allow(dead_code)]

use anyhow::Result;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use voxbridge::audio::{
    encoder, AudioFrame, CaptureBackend, PlaybackSink, ScheduledUnit,
};
use voxbridge::channel::{
    ChannelEvent, ChannelSetup, ChannelStreams, DuplexChannel, FrameSender, InboundAudioChunk,
};
use voxbridge::error::ConnectionError;
use voxbridge::EncodedFrame;

/// Build a mono frame of the given length.
pub fn frame(len: usize, sample_rate: u32) -> AudioFrame {
    AudioFrame {
        samples: vec![0.1; len],
        sample_rate,
        channels: 1,
        timestamp_ms: 0,
    }
}

/// Build a wire-encoded inbound chunk with `len` samples.
pub fn chunk(turn_id: &str, len: usize, sample_rate: u32) -> InboundAudioChunk {
    let encoded = encoder::encode(&frame(len, sample_rate)).expect("test chunk encodes");
    InboundAudioChunk {
        turn_id: turn_id.to_string(),
        pcm: encoded.pcm,
        sample_rate,
    }
}

/// Playback sink that records every call it receives.
#[derive(Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<SinkLog>>,
}

#[derive(Default)]
struct SinkLog {
    played: Vec<ScheduledUnit>,
    opened: u32,
    flushed: u32,
    closed: u32,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn played(&self) -> Vec<ScheduledUnit> {
        self.inner.lock().unwrap().played.clone()
    }

    pub fn opened(&self) -> u32 {
        self.inner.lock().unwrap().opened
    }

    pub fn flushed(&self) -> u32 {
        self.inner.lock().unwrap().flushed
    }

    pub fn closed(&self) -> u32 {
        self.inner.lock().unwrap().closed
    }
}

#[async_trait::async_trait]
impl PlaybackSink for RecordingSink {
    async fn open(&self) -> Result<()> {
        self.inner.lock().unwrap().opened += 1;
        Ok(())
    }

    async fn play(&self, unit: &ScheduledUnit, _samples: &[f32], _sample_rate: u32) -> Result<()> {
        self.inner.lock().unwrap().played.push(unit.clone());
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.inner.lock().unwrap().flushed += 1;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.lock().unwrap().closed += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

/// Capture backend the test feeds by hand.
pub struct ScriptedCapture {
    feeder: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
    capturing: bool,
}

/// Test-side handle for a `ScriptedCapture`.
#[derive(Clone)]
pub struct CaptureHandle {
    feeder: Arc<Mutex<Option<mpsc::Sender<AudioFrame>>>>,
    starts: Arc<AtomicU32>,
    stops: Arc<AtomicU32>,
}

impl ScriptedCapture {
    pub fn new() -> (Self, CaptureHandle) {
        let feeder = Arc::new(Mutex::new(None));
        let starts = Arc::new(AtomicU32::new(0));
        let stops = Arc::new(AtomicU32::new(0));
        let handle = CaptureHandle {
            feeder: Arc::clone(&feeder),
            starts: Arc::clone(&starts),
            stops: Arc::clone(&stops),
        };
        (
            Self {
                feeder,
                starts,
                stops,
                capturing: false,
            },
            handle,
        )
    }
}

impl CaptureHandle {
    /// Push a frame into the capture stream. Returns false once capture has
    /// stopped.
    pub async fn feed(&self, frame: AudioFrame) -> bool {
        let sender = self.feeder.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(frame).await.is_ok(),
            None => false,
        }
    }

    pub fn starts(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for ScriptedCapture {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let (tx, rx) = mpsc::channel(64);
        *self.feeder.lock().unwrap() = Some(tx);
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.capturing {
            return Ok(());
        }
        self.feeder.lock().unwrap().take();
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Duplex channel the test drives: outbound frames are collected, inbound
/// events come from the test.
pub struct FakeChannel {
    events_slot: Arc<Mutex<Option<mpsc::Sender<ChannelEvent>>>>,
    sent: Arc<Mutex<Vec<EncodedFrame>>>,
    connects: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
    fail_connect: bool,
    auto_open: bool,
}

/// Test-side handle for a `FakeChannel`.
#[derive(Clone)]
pub struct ChannelHandle {
    events_slot: Arc<Mutex<Option<mpsc::Sender<ChannelEvent>>>>,
    sent: Arc<Mutex<Vec<EncodedFrame>>>,
    connects: Arc<AtomicU32>,
    closes: Arc<AtomicU32>,
}

impl FakeChannel {
    /// `auto_open` controls whether connect immediately queues an `Opened`
    /// confirmation.
    pub fn new(auto_open: bool, fail_connect: bool) -> (Self, ChannelHandle) {
        let events_slot = Arc::new(Mutex::new(None));
        let sent = Arc::new(Mutex::new(Vec::new()));
        let connects = Arc::new(AtomicU32::new(0));
        let closes = Arc::new(AtomicU32::new(0));
        let handle = ChannelHandle {
            events_slot: Arc::clone(&events_slot),
            sent: Arc::clone(&sent),
            connects: Arc::clone(&connects),
            closes: Arc::clone(&closes),
        };
        (
            Self {
                events_slot,
                sent,
                connects,
                closes,
                fail_connect,
                auto_open,
            },
            handle,
        )
    }
}

impl ChannelHandle {
    /// Inject an inbound event. Returns false once the channel has closed.
    pub async fn emit(&self, event: ChannelEvent) -> bool {
        let sender = self.events_slot.lock().unwrap().clone();
        match sender {
            Some(tx) => tx.send(event).await.is_ok(),
            None => false,
        }
    }

    pub fn sent(&self) -> Vec<EncodedFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl DuplexChannel for FakeChannel {
    async fn connect(&mut self, _setup: &ChannelSetup) -> Result<ChannelStreams, ConnectionError> {
        if self.fail_connect {
            return Err(ConnectionError::transport("relay refused the connection"));
        }

        self.connects.fetch_add(1, Ordering::SeqCst);

        let (events_tx, events_rx) = mpsc::channel(64);
        if self.auto_open {
            let _ = events_tx.send(ChannelEvent::Opened).await;
        }
        *self.events_slot.lock().unwrap() = Some(events_tx);

        let (frames_tx, mut frames_rx) = mpsc::channel(64);
        let sent = Arc::clone(&self.sent);
        tokio::spawn(async move {
            while let Some(frame) = frames_rx.recv().await {
                sent.lock().unwrap().push(frame);
            }
        });

        Ok(ChannelStreams {
            frames: FrameSender::new(frames_tx),
            events: events_rx,
        })
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some(tx) = self.events_slot.lock().unwrap().take() {
            let _ = tx.try_send(ChannelEvent::Closed);
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "fake"
    }
}
