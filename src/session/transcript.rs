use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::channel::TranscriptSide;

/// Running display transcripts for both sides of the conversation.
///
/// Fragments append within a turn. When a turn completes the buffers stay
/// visible for a grace interval and are then cleared; a fragment arriving
/// before the interval elapses cancels the pending clear and starts the new
/// turn from empty buffers. Pure in-memory state; at most one buffer pair
/// exists per session.
#[derive(Clone)]
pub struct TranscriptAccumulator {
    inner: Arc<Mutex<Buffers>>,
    grace: Duration,
}

#[derive(Default)]
struct Buffers {
    user: String,
    ai: String,
    pending_clear: bool,
    /// Bumped whenever a pending clear is armed or cancelled, so a stale
    /// grace timer never clears a newer turn
    generation: u64,
}

impl TranscriptAccumulator {
    pub fn new(grace: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Buffers::default())),
            grace,
        }
    }

    /// Append a fragment to one side's running buffer.
    pub async fn append(&self, side: TranscriptSide, fragment: &str) {
        let mut buffers = self.inner.lock().await;

        if buffers.pending_clear {
            // A new turn began inside the grace interval: cancel the pending
            // clear and start fresh.
            buffers.user.clear();
            buffers.ai.clear();
            buffers.pending_clear = false;
            buffers.generation += 1;
        }

        match side {
            TranscriptSide::User => buffers.user.push_str(fragment),
            TranscriptSide::Ai => buffers.ai.push_str(fragment),
        }
    }

    /// Arm the display-grace clear for the turn that just completed.
    pub async fn on_turn_complete(&self) {
        let generation = {
            let mut buffers = self.inner.lock().await;
            buffers.pending_clear = true;
            buffers.generation += 1;
            buffers.generation
        };

        let inner = Arc::clone(&self.inner);
        let grace = self.grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;

            let mut buffers = inner.lock().await;
            if buffers.pending_clear && buffers.generation == generation {
                debug!("Transcript display grace elapsed; clearing buffers");
                buffers.user.clear();
                buffers.ai.clear();
                buffers.pending_clear = false;
            }
        });
    }

    /// Current (user, ai) display strings.
    pub async fn snapshot(&self) -> (String, String) {
        let buffers = self.inner.lock().await;
        (buffers.user.clone(), buffers.ai.clone())
    }

    /// Drop everything immediately (session teardown).
    pub async fn reset(&self) {
        let mut buffers = self.inner.lock().await;
        buffers.user.clear();
        buffers.ai.clear();
        buffers.pending_clear = false;
        buffers.generation += 1;
    }
}
