use anyhow::Result;
use chrono::Utc;
use futures::stream::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::duplex::{ChannelEvent, ChannelSetup, ChannelStreams, DuplexChannel, FrameSender};
use super::messages::{AudioFrameMessage, RelayEventMessage, SessionSetupMessage};
use crate::audio::EncodedFrame;
use crate::error::{ConnectionError, ConnectionErrorKind};

/// Duplex channel over a NATS relay.
///
/// Outbound frames are published to `{prefix}.{session}.audio`; the remote
/// service's events arrive as JSON on `{prefix}.{session}.events` and are
/// forwarded, in arrival order, as `ChannelEvent`s. Session setup is
/// published once to `{prefix}.{session}.setup` after the event subscription
/// is live, so the `Opened` reply cannot be missed.
pub struct NatsChannel {
    url: String,
    subject_prefix: String,
    conn: Option<ActiveConn>,
}

struct ActiveConn {
    client: async_nats::Client,
    session_id: String,
    closed: Arc<AtomicBool>,
    events_tx: mpsc::Sender<ChannelEvent>,
    inbound_task: JoinHandle<()>,
    outbound_task: JoinHandle<()>,
}

impl NatsChannel {
    pub fn new(url: impl Into<String>, subject_prefix: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subject_prefix: subject_prefix.into(),
            conn: None,
        }
    }

    fn subject(&self, session_id: &str, leaf: &str) -> String {
        format!("{}.{}.{}", self.subject_prefix, session_id, leaf)
    }
}

#[async_trait::async_trait]
impl DuplexChannel for NatsChannel {
    async fn connect(&mut self, setup: &ChannelSetup) -> Result<ChannelStreams, ConnectionError> {
        if self.conn.is_some() {
            // One stream per channel; drop any stale connection first.
            let _ = self.close().await;
        }

        info!("Connecting to relay at {}", self.url);

        let client = async_nats::connect(self.url.as_str())
            .await
            .map_err(|e| ConnectionError::transport(format!("Failed to connect to relay: {}", e)))?;

        let events_subject = self.subject(&setup.session_id, "events");
        let mut subscriber = client.subscribe(events_subject.clone()).await.map_err(|e| {
            ConnectionError::transport(format!("Failed to subscribe to {}: {}", events_subject, e))
        })?;

        let setup_message = SessionSetupMessage {
            session_id: setup.session_id.clone(),
            system_instruction: setup.system_instruction.clone(),
            source_language: setup.source_language.clone(),
            target_language: setup.target_language.clone(),
            response_modality: "audio".to_string(),
            transcribe_input: setup.transcribe_input,
            transcribe_output: setup.transcribe_output,
            timestamp: Utc::now().to_rfc3339(),
        };
        let payload = serde_json::to_vec(&setup_message)
            .map_err(|e| ConnectionError::new(ConnectionErrorKind::Protocol, e.to_string()))?;
        client
            .publish(self.subject(&setup.session_id, "setup"), payload.into())
            .await
            .map_err(|e| {
                ConnectionError::transport(format!("Failed to publish session setup: {}", e))
            })?;

        let (events_tx, events_rx) = mpsc::channel(256);
        let (frames_tx, mut frames_rx) = mpsc::channel::<EncodedFrame>(64);
        let closed = Arc::new(AtomicBool::new(false));

        // Inbound: relay JSON -> ordered ChannelEvents
        let inbound_tx = events_tx.clone();
        let inbound_closed = Arc::clone(&closed);
        let inbound_task = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                if inbound_closed.load(Ordering::SeqCst) {
                    break;
                }

                match serde_json::from_slice::<RelayEventMessage>(&msg.payload) {
                    Ok(event) => {
                        let last = matches!(event, RelayEventMessage::Closed);
                        if inbound_tx.send(event.into()).await.is_err() {
                            break;
                        }
                        if last {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Unparseable relay event: {}", e);
                    }
                }
            }

            debug!("Relay event loop ended");
        });

        // Outbound: queued frames -> relay
        let audio_subject = self.subject(&setup.session_id, "audio");
        let outbound_client = client.clone();
        let outbound_closed = Arc::clone(&closed);
        let outbound_events = events_tx.clone();
        let session_id = setup.session_id.clone();
        let outbound_task = tokio::spawn(async move {
            let mut sequence: u32 = 0;

            while let Some(frame) = frames_rx.recv().await {
                if outbound_closed.load(Ordering::SeqCst) {
                    break;
                }

                let message = AudioFrameMessage {
                    session_id: session_id.clone(),
                    sequence,
                    pcm: frame.pcm,
                    sample_rate: frame.sample_rate,
                    final_frame: false,
                };
                sequence = sequence.wrapping_add(1);

                let payload = match serde_json::to_vec(&message) {
                    Ok(payload) => payload,
                    Err(e) => {
                        warn!("Failed to serialize audio frame: {}", e);
                        continue;
                    }
                };

                if let Err(e) = outbound_client.publish(audio_subject.clone(), payload.into()).await
                {
                    error!("Failed to publish audio frame: {}", e);
                    let _ = outbound_events.try_send(ChannelEvent::Error(
                        ConnectionError::transport(format!("Publish failed: {}", e)),
                    ));
                    break;
                }
            }

            debug!("Outbound frame loop ended");
        });

        self.conn = Some(ActiveConn {
            client,
            session_id: setup.session_id.clone(),
            closed,
            events_tx,
            inbound_task,
            outbound_task,
        });

        info!("Relay channel connected for session {}", setup.session_id);

        Ok(ChannelStreams {
            frames: FrameSender::new(frames_tx),
            events: events_rx,
        })
    }

    async fn close(&mut self) -> Result<()> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        if conn.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        info!("Closing relay channel for session {}", conn.session_id);

        // A final empty frame tells the relay the stream is over.
        let message = AudioFrameMessage {
            session_id: conn.session_id.clone(),
            sequence: u32::MAX,
            pcm: String::new(),
            sample_rate: 0,
            final_frame: true,
        };
        if let Ok(payload) = serde_json::to_vec(&message) {
            let subject = format!("{}.{}.audio", self.subject_prefix, conn.session_id);
            let _ = conn.client.publish(subject, payload.into()).await;
        }
        let _ = conn.client.flush().await;

        conn.inbound_task.abort();
        conn.outbound_task.abort();

        // The consumer sees a final Closed even when the relay never sent one.
        let _ = conn.events_tx.try_send(ChannelEvent::Closed);

        Ok(())
    }

    fn name(&self) -> &str {
        "nats"
    }
}
