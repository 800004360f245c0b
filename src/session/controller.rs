use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::{SessionConfig, StartOptions};
use super::state::{ConnectionState, SessionSnapshot, SessionStats};
use super::transcript::TranscriptAccumulator;
use crate::audio::{encoder, CaptureBackend, PlaybackScheduler, PlaybackSink};
use crate::channel::{ChannelEvent, ChannelStreams, DuplexChannel, FrameSender};
use crate::error::SessionError;

/// How long teardown waits for the session loops before abandoning them
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Orchestrates one live translation session at a time.
///
/// Owns the lifecycle (`Idle → Connecting → Connected → Closing →
/// Closed/Idle`), wires microphone frames through the encoder into the
/// channel, and dispatches channel events to the playback scheduler and the
/// transcript accumulator. `start` and `stop` are idempotent. Every failure
/// path releases the microphone and playback device before surfacing an
/// error, so the caller can always retry `start()`.
pub struct LiveSessionController {
    defaults: SessionConfig,
    capture: Arc<Mutex<Box<dyn CaptureBackend>>>,
    channel: Arc<Mutex<Box<dyn DuplexChannel>>>,
    sink: Arc<dyn PlaybackSink>,
    session: Arc<Mutex<Option<ActiveSession>>>,
    state_tx: watch::Sender<ConnectionState>,
    last_error: Arc<Mutex<Option<String>>>,
    transcript: TranscriptAccumulator,
    /// True from `Connected` until teardown begins; the capture and event
    /// loops watch it
    active: Arc<AtomicBool>,
    frames_sent: Arc<AtomicU64>,
    turns_completed: Arc<AtomicU64>,
}

struct ActiveSession {
    id: String,
    started_at: DateTime<Utc>,
    scheduler: Arc<PlaybackScheduler>,
    frames: FrameSender,
    capture_task: JoinHandle<()>,
    event_task: JoinHandle<()>,
}

impl LiveSessionController {
    pub fn new(
        defaults: SessionConfig,
        capture: Box<dyn CaptureBackend>,
        channel: Box<dyn DuplexChannel>,
        sink: Arc<dyn PlaybackSink>,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            transcript: TranscriptAccumulator::new(defaults.transcript_grace),
            defaults,
            capture: Arc::new(Mutex::new(capture)),
            channel: Arc::new(Mutex::new(channel)),
            sink,
            session: Arc::new(Mutex::new(None)),
            state_tx,
            last_error: Arc::new(Mutex::new(None)),
            active: Arc::new(AtomicBool::new(false)),
            frames_sent: Arc::new(AtomicU64::new(0)),
            turns_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Start a live session. No-op when one is already starting or running.
    pub async fn start(&self, opts: StartOptions) -> Result<(), SessionError> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            warn!("start() ignored: session already active");
            return Ok(());
        }
        if self.state() == ConnectionState::Closing {
            warn!("start() ignored: previous session still closing");
            return Ok(());
        }

        let config = self.defaults.for_start(opts);
        info!(
            "Starting session {} ({} -> {})",
            config.session_id, config.source_language, config.target_language
        );

        *self.last_error.lock().await = None;
        self.frames_sent.store(0, Ordering::Relaxed);
        self.turns_completed.store(0, Ordering::Relaxed);
        self.transcript.reset().await;
        self.state_tx.send_replace(ConnectionState::Connecting);

        // The microphone is a scoped resource: every failure below releases
        // it before the error is surfaced.
        let frame_rx = {
            let mut capture = self.capture.lock().await;
            match capture.start().await {
                Ok(rx) => rx,
                Err(e) => {
                    let message = format!("{:#}", e);
                    self.fail_connect(&message).await;
                    return Err(SessionError::Resource(message));
                }
            }
        };

        let setup = config.channel_setup();
        let connected = {
            let mut channel = self.channel.lock().await;
            tokio::time::timeout(config.connect_timeout, channel.connect(&setup)).await
        };
        let streams = match connected {
            Ok(Ok(streams)) => streams,
            Ok(Err(e)) => {
                let message = e.to_string();
                self.release_capture().await;
                self.fail_connect(&message).await;
                return Err(SessionError::Connect(message));
            }
            Err(_) => {
                let message = "connect timed out".to_string();
                self.release_capture().await;
                self.fail_connect(&message).await;
                return Err(SessionError::Connect(message));
            }
        };
        let ChannelStreams { frames, mut events } = streams;

        // The session is up once the remote service confirms the setup.
        let deadline = tokio::time::Instant::now() + config.connect_timeout;
        loop {
            match tokio::time::timeout_at(deadline, events.recv()).await {
                Ok(Some(ChannelEvent::Opened)) => break,
                Ok(Some(ChannelEvent::Error(e))) => {
                    let message = e.to_string();
                    self.release_io().await;
                    self.fail_connect(&message).await;
                    return Err(SessionError::Connect(message));
                }
                Ok(Some(event)) => {
                    debug!("Ignoring event before open: {:?}", event);
                }
                Ok(None) => {
                    let message = "channel closed before opening".to_string();
                    self.release_io().await;
                    self.fail_connect(&message).await;
                    return Err(SessionError::Connect(message));
                }
                Err(_) => {
                    let message = "no opened confirmation before timeout".to_string();
                    self.release_io().await;
                    self.fail_connect(&message).await;
                    return Err(SessionError::Connect(message));
                }
            }
        }

        self.active.store(true, Ordering::SeqCst);
        self.state_tx.send_replace(ConnectionState::Connected);
        info!("Session {} connected", config.session_id);

        let scheduler = Arc::new(PlaybackScheduler::new(Arc::clone(&self.sink)));

        // Capture loop: frames -> encoder -> channel. `FrameSender::send`
        // never blocks, so capture latency stays bounded regardless of
        // channel backpressure.
        let capture_task = {
            let active = Arc::clone(&self.active);
            let frames = frames.clone();
            let frames_sent = Arc::clone(&self.frames_sent);
            let mut frame_rx = frame_rx;
            tokio::spawn(async move {
                debug!("Capture loop started");

                while let Some(frame) = frame_rx.recv().await {
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }
                    match encoder::encode(&frame) {
                        Ok(encoded) => {
                            frames.send(encoded);
                            frames_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => warn!("Skipping unencodable frame: {}", e),
                    }
                }

                debug!("Capture loop stopped");
            })
        };

        // Event loop: ordered channel events -> scheduler / transcripts.
        // Tears the session down itself when the relay faults or closes.
        let event_task = {
            let active = Arc::clone(&self.active);
            let scheduler = Arc::clone(&scheduler);
            let transcript = self.transcript.clone();
            let turns_completed = Arc::clone(&self.turns_completed);
            let last_error = Arc::clone(&self.last_error);
            let state_tx = self.state_tx.clone();
            let capture = Arc::clone(&self.capture);
            let channel = Arc::clone(&self.channel);
            let session = Arc::clone(&self.session);
            tokio::spawn(async move {
                debug!("Event loop started");
                let mut fault = None;

                while let Some(event) = events.recv().await {
                    if !active.load(Ordering::SeqCst) {
                        break;
                    }

                    match event {
                        ChannelEvent::Opened => {}
                        ChannelEvent::AudioChunk(chunk) => {
                            scheduler.schedule(chunk).await;
                        }
                        ChannelEvent::PartialTranscript { side, text } => {
                            transcript.append(side, &text).await;
                        }
                        ChannelEvent::TurnComplete => {
                            turns_completed.fetch_add(1, Ordering::Relaxed);
                            transcript.on_turn_complete().await;
                        }
                        ChannelEvent::Interrupted => {
                            debug!("Barge-in; flushing playback");
                            scheduler.interrupt().await;
                        }
                        ChannelEvent::Error(e) => {
                            error!("Channel fault: {}", e);
                            fault = Some(e.to_string());
                            break;
                        }
                        ChannelEvent::Closed => {
                            if active.load(Ordering::SeqCst) {
                                warn!("Relay closed the stream");
                                fault = Some("relay closed the stream".to_string());
                            }
                            break;
                        }
                    }
                }

                debug!("Event loop stopped");

                // Remote-initiated teardown. When `stop()` started first the
                // flag is already clear and cleanup belongs to it.
                if active.swap(false, Ordering::SeqCst) {
                    state_tx.send_replace(ConnectionState::Closing);
                    if let Some(message) = fault {
                        *last_error.lock().await = Some(message);
                    }
                    {
                        let mut capture = capture.lock().await;
                        if let Err(e) = capture.stop().await {
                            warn!("Capture stop failed: {:#}", e);
                        }
                    }
                    {
                        let mut channel = channel.lock().await;
                        if let Err(e) = channel.close().await {
                            warn!("Channel close failed: {:#}", e);
                        }
                    }
                    scheduler.shutdown().await;
                    session.lock().await.take();
                    state_tx.send_replace(ConnectionState::Idle);
                    info!("Session torn down after channel fault");
                }
            })
        };

        *slot = Some(ActiveSession {
            id: config.session_id,
            started_at: Utc::now(),
            scheduler,
            frames,
            capture_task,
            event_task,
        });

        Ok(())
    }

    /// Stop the live session and release every resource. No-op when none is
    /// active. Returns the final session statistics.
    pub async fn stop(&self) -> Option<SessionStats> {
        let sess = {
            let mut slot = self.session.lock().await;
            match slot.take() {
                Some(sess) => sess,
                None => {
                    debug!("stop() ignored: no active session");
                    return None;
                }
            }
        };

        info!("Stopping session {}", sess.id);
        self.state_tx.send_replace(ConnectionState::Closing);
        self.active.store(false, Ordering::SeqCst);

        {
            let mut capture = self.capture.lock().await;
            if let Err(e) = capture.stop().await {
                warn!("Capture stop failed: {:#}", e);
            }
        }
        {
            let mut channel = self.channel.lock().await;
            if let Err(e) = channel.close().await {
                warn!("Channel close failed: {:#}", e);
            }
        }
        sess.scheduler.shutdown().await;

        let stats = self.stats_for(&sess);

        if tokio::time::timeout(SHUTDOWN_GRACE, sess.capture_task)
            .await
            .is_err()
        {
            warn!("Capture loop did not stop in time");
        }
        let event_abort = sess.event_task.abort_handle();
        if tokio::time::timeout(SHUTDOWN_GRACE, sess.event_task)
            .await
            .is_err()
        {
            warn!("Event loop did not stop in time");
            event_abort.abort();
        }

        self.transcript.reset().await;
        self.state_tx.send_replace(ConnectionState::Closed);
        info!("Session {} stopped", sess.id);

        Some(stats)
    }

    /// Read model for the presentation layer.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let (user_transcript, ai_transcript) = self.transcript.snapshot().await;
        let stats = {
            let slot = self.session.lock().await;
            slot.as_ref().map(|s| self.stats_for(s)).unwrap_or_default()
        };

        SessionSnapshot {
            connection_state: self.state(),
            last_error: self.last_error.lock().await.clone(),
            user_transcript,
            ai_transcript,
            stats,
        }
    }

    fn stats_for(&self, sess: &ActiveSession) -> SessionStats {
        let (chunks_scheduled, chunks_discarded) = sess.scheduler.stats();
        SessionStats {
            started_at: Some(sess.started_at),
            duration_secs: Utc::now()
                .signed_duration_since(sess.started_at)
                .num_milliseconds() as f64
                / 1000.0,
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            frames_dropped: sess.frames.dropped(),
            chunks_scheduled,
            chunks_discarded,
            turns_completed: self.turns_completed.load(Ordering::Relaxed),
        }
    }

    async fn release_capture(&self) {
        let mut capture = self.capture.lock().await;
        if let Err(e) = capture.stop().await {
            warn!("Capture stop failed: {:#}", e);
        }
    }

    async fn release_io(&self) {
        self.release_capture().await;
        let mut channel = self.channel.lock().await;
        if let Err(e) = channel.close().await {
            warn!("Channel close failed: {:#}", e);
        }
    }

    async fn fail_connect(&self, message: &str) {
        error!("Session start failed: {}", message);
        *self.last_error.lock().await = Some(message.to_string());
        self.state_tx.send_replace(ConnectionState::Idle);
    }
}
