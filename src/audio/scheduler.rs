//! Playback timeline for inbound synthesized audio.
//!
//! Chunks belonging to one utterance must play gaplessly and strictly in
//! order, a new utterance may begin scheduling at any time, and everything
//! pending or playing must stop instantly on barge-in. All timeline state
//! lives behind one lock: start times are computed, the pending set is
//! updated, and units are handed to the sink without ever reading a stale
//! `next_start`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::encoder;
use super::playback::{PlaybackSink, ScheduledUnit};
use crate::channel::InboundAudioChunk;

/// Owns the playback timeline and the output sink for one session.
pub struct PlaybackScheduler {
    sink: Arc<dyn PlaybackSink>,
    timeline: Arc<Mutex<Timeline>>,
    shut_down: Arc<AtomicBool>,
    chunks_scheduled: AtomicU64,
    chunks_discarded: AtomicU64,
}

struct Timeline {
    /// Offset at which the next unit may begin; monotonically non-decreasing
    /// while a turn is active, reset to zero on interruption
    next_start: Duration,
    /// Instant corresponding to offset zero
    origin: tokio::time::Instant,
    /// Bumped on interruption so in-flight dispatch tasks go stale
    epoch: u64,
    /// Dispatch tasks for units that have not played yet
    pending: HashMap<u64, JoinHandle<()>>,
    next_unit_id: u64,
    sink_open: bool,
}

impl PlaybackScheduler {
    pub fn new(sink: Arc<dyn PlaybackSink>) -> Self {
        Self {
            sink,
            timeline: Arc::new(Mutex::new(Timeline {
                next_start: Duration::ZERO,
                origin: tokio::time::Instant::now(),
                epoch: 0,
                pending: HashMap::new(),
                next_unit_id: 0,
                sink_open: false,
            })),
            shut_down: Arc::new(AtomicBool::new(false)),
            chunks_scheduled: AtomicU64::new(0),
            chunks_discarded: AtomicU64::new(0),
        }
    }

    /// Decode a chunk and bind it to the next free slot on the timeline.
    ///
    /// Returns the scheduled unit, or `None` when the chunk was discarded:
    /// after `shutdown` (late chunks are dropped silently), or when the
    /// payload fails to decode. An undecodable payload still advances the
    /// timeline by its nominal duration when the payload length allows
    /// computing one, so later chunks keep their slots.
    pub async fn schedule(&self, chunk: InboundAudioChunk) -> Option<ScheduledUnit> {
        if self.shut_down.load(Ordering::SeqCst) {
            debug!("Discarding chunk that arrived after shutdown");
            return None;
        }

        let decoded = encoder::decode(&chunk.pcm);
        let mut timeline = self.timeline.lock().await;

        // Re-check under the lock; shutdown may have begun while decoding.
        if self.shut_down.load(Ordering::SeqCst) {
            debug!("Discarding chunk that arrived after shutdown");
            return None;
        }

        let samples = match decoded {
            Ok(samples) => samples,
            Err(e) => {
                self.chunks_discarded.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping undecodable chunk for turn {}: {}", chunk.turn_id, e);

                if let Some(count) = encoder::nominal_sample_count(&chunk.pcm) {
                    let duration = samples_duration(count, chunk.sample_rate);
                    let now = timeline.origin.elapsed();
                    let start_at = timeline.next_start.max(now);
                    timeline.next_start = start_at + duration;
                }
                return None;
            }
        };

        if !timeline.sink_open {
            if let Err(e) = self.sink.open().await {
                self.chunks_discarded.fetch_add(1, Ordering::Relaxed);
                error!("Failed to open playback sink: {}", e);
                return None;
            }
            timeline.sink_open = true;
        }

        let duration = samples_duration(samples.len(), chunk.sample_rate);
        let now = timeline.origin.elapsed();
        let start_at = timeline.next_start.max(now);
        timeline.next_start = start_at + duration;

        let id = timeline.next_unit_id;
        timeline.next_unit_id += 1;

        let unit = ScheduledUnit {
            id,
            turn_id: chunk.turn_id,
            start_at,
            duration,
        };

        let epoch = timeline.epoch;
        let deadline = timeline.origin + start_at;
        let sink = Arc::clone(&self.sink);
        let timeline_ref = Arc::clone(&self.timeline);
        let shut_down = Arc::clone(&self.shut_down);
        let dispatch_unit = unit.clone();
        let sample_rate = chunk.sample_rate;

        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;

            // Epoch check and sink hand-off happen under the timeline lock,
            // so an interruption can never race a unit into the sink after
            // its flush.
            let mut timeline = timeline_ref.lock().await;
            if timeline.epoch != epoch || shut_down.load(Ordering::SeqCst) {
                return;
            }
            timeline.pending.remove(&dispatch_unit.id);

            if let Err(e) = sink.play(&dispatch_unit, &samples, sample_rate).await {
                warn!("Playback sink rejected unit {}: {}", dispatch_unit.id, e);
            }
        });

        timeline.pending.insert(id, handle);
        self.chunks_scheduled.fetch_add(1, Ordering::Relaxed);

        Some(unit)
    }

    /// Halt every pending or playing unit and rewind the timeline to zero.
    ///
    /// Idempotent; safe to call when nothing is playing. The next `schedule`
    /// computes its start against the fresh clock.
    pub async fn interrupt(&self) {
        let mut timeline = self.timeline.lock().await;
        let flushed = timeline.pending.len();

        for (_, handle) in timeline.pending.drain() {
            handle.abort();
        }
        timeline.epoch += 1;
        timeline.next_start = Duration::ZERO;
        timeline.origin = tokio::time::Instant::now();

        if timeline.sink_open {
            if let Err(e) = self.sink.flush().await {
                warn!("Playback sink flush failed: {}", e);
            }
        }

        if flushed > 0 {
            debug!("Interrupted playback; {} pending units flushed", flushed);
        }
    }

    /// Interrupt, then release the playback sink.
    ///
    /// After shutdown every `schedule` call discards its chunk silently.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }

        self.interrupt().await;

        let mut timeline = self.timeline.lock().await;
        if timeline.sink_open {
            timeline.sink_open = false;
            if let Err(e) = self.sink.close().await {
                warn!("Playback sink close failed: {}", e);
            }
        }
    }

    /// Offset at which the next unit would start.
    pub async fn next_start(&self) -> Duration {
        self.timeline.lock().await.next_start
    }

    /// (chunks scheduled, chunks discarded) so far.
    pub fn stats(&self) -> (u64, u64) {
        (
            self.chunks_scheduled.load(Ordering::Relaxed),
            self.chunks_discarded.load(Ordering::Relaxed),
        )
    }
}

fn samples_duration(count: usize, sample_rate: u32) -> Duration {
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(count as f64 / sample_rate as f64)
}
