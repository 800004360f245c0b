// End-to-end tests for the live session controller: lifecycle, streaming,
// barge-in, fault recovery, and resource release

mod common;

use common::{chunk, frame, CaptureHandle, ChannelHandle, FakeChannel, RecordingSink, ScriptedCapture};
use std::sync::Arc;
use std::time::Duration;
use voxbridge::channel::{ChannelEvent, TranscriptSide};
use voxbridge::error::{ConnectionError, SessionError};
use voxbridge::session::{ConnectionState, LiveSessionController, SessionConfig, StartOptions};

const CAPTURE_RATE: u32 = 16000;
const PLAYBACK_RATE: u32 = 24000;

fn test_config() -> SessionConfig {
    SessionConfig {
        connect_timeout: Duration::from_secs(2),
        ..SessionConfig::default()
    }
}

fn build(
    auto_open: bool,
    fail_connect: bool,
) -> (
    LiveSessionController,
    ChannelHandle,
    CaptureHandle,
    RecordingSink,
) {
    let (capture, capture_handle) = ScriptedCapture::new();
    let (channel, channel_handle) = FakeChannel::new(auto_open, fail_connect);
    let sink = RecordingSink::new();
    let controller = LiveSessionController::new(
        test_config(),
        Box::new(capture),
        Box::new(channel),
        Arc::new(sink.clone()),
    );
    (controller, channel_handle, capture_handle, sink)
}

/// Give the session loops a chance to run without advancing past scheduled
/// playback.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_reaches_connected_and_streams_frames() {
    let (controller, channel, capture, _sink) = build(true, false);

    controller.start(StartOptions::default()).await.unwrap();
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(capture.starts(), 1);

    assert!(capture.feed(frame(1600, CAPTURE_RATE)).await);
    settle().await;

    let sent = channel.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].sample_count, 1600);
    assert_eq!(sent[0].sample_rate, CAPTURE_RATE);
}

#[tokio::test(start_paused = true)]
async fn test_start_twice_keeps_a_single_session() {
    let (controller, channel, capture, _sink) = build(true, false);

    controller.start(StartOptions::default()).await.unwrap();
    controller.start(StartOptions::default()).await.unwrap();

    assert_eq!(channel.connects(), 1);
    assert_eq!(capture.starts(), 1);
    assert_eq!(controller.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_stop_when_idle_is_a_noop() {
    let (controller, _channel, capture, _sink) = build(true, false);

    assert!(controller.stop().await.is_none());
    assert_eq!(controller.state(), ConnectionState::Idle);
    assert_eq!(capture.stops(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_releases_the_microphone() {
    let (controller, _channel, capture, _sink) = build(true, true);

    let err = controller.start(StartOptions::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(_)));
    assert_eq!(controller.state(), ConnectionState::Idle);
    assert_eq!(capture.starts(), 1);
    assert_eq!(capture.stops(), 1);

    let snapshot = controller.snapshot().await;
    assert!(snapshot.last_error.unwrap().contains("refused"));
}

#[tokio::test(start_paused = true)]
async fn test_missing_open_confirmation_times_out() {
    let (controller, _channel, capture, _sink) = build(false, false);

    let err = controller.start(StartOptions::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::Connect(_)));
    assert_eq!(controller.state(), ConnectionState::Idle);
    assert_eq!(capture.stops(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transcripts_accumulate_and_clear_after_turn() {
    let (controller, channel, _capture, _sink) = build(true, false);

    controller.start(StartOptions::default()).await.unwrap();

    channel
        .emit(ChannelEvent::PartialTranscript {
            side: TranscriptSide::User,
            text: "Hola".to_string(),
        })
        .await;
    channel
        .emit(ChannelEvent::PartialTranscript {
            side: TranscriptSide::User,
            text: " amigo".to_string(),
        })
        .await;
    channel
        .emit(ChannelEvent::PartialTranscript {
            side: TranscriptSide::Ai,
            text: "Hello friend".to_string(),
        })
        .await;
    settle().await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.user_transcript, "Hola amigo");
    assert_eq!(snapshot.ai_transcript, "Hello friend");

    channel.emit(ChannelEvent::TurnComplete).await;
    settle().await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.user_transcript, "");
    assert_eq!(snapshot.ai_transcript, "");
    assert_eq!(snapshot.stats.turns_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_remote_fault_tears_the_session_down() {
    let (controller, channel, capture, sink) = build(true, false);

    controller.start(StartOptions::default()).await.unwrap();

    channel
        .emit(ChannelEvent::AudioChunk(chunk("turn-1", 2400, PLAYBACK_RATE)))
        .await;
    settle().await;
    channel
        .emit(ChannelEvent::Error(ConnectionError::remote(
            "model overloaded",
        )))
        .await;
    settle().await;

    assert_eq!(controller.state(), ConnectionState::Idle);
    assert_eq!(capture.stops(), 1);
    assert!(channel.closes() >= 1);
    assert_eq!(sink.closed(), 1);

    let snapshot = controller.snapshot().await;
    assert!(snapshot.last_error.unwrap().contains("model overloaded"));

    // The controller came back clean; a fresh start succeeds
    controller.start(StartOptions::default()).await.unwrap();
    assert_eq!(controller.state(), ConnectionState::Connected);
    assert_eq!(channel.connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_barge_in_and_stop() {
    let (controller, channel, capture, sink) = build(true, false);

    controller.start(StartOptions::default()).await.unwrap();
    assert_eq!(controller.state(), ConnectionState::Connected);

    // Two chunks of one utterance: the second queues directly behind the
    // first on the playback timeline
    channel
        .emit(ChannelEvent::AudioChunk(chunk("turn-1", 12000, PLAYBACK_RATE))) // 0.5s
        .await;
    channel
        .emit(ChannelEvent::AudioChunk(chunk("turn-1", 12000, PLAYBACK_RATE)))
        .await;
    settle().await;

    let played = sink.played();
    assert_eq!(played.len(), 1);
    assert_eq!(played[0].start_at, Duration::ZERO);

    // Barge-in: pending playback is flushed immediately
    channel.emit(ChannelEvent::Interrupted).await;
    settle().await;
    assert!(sink.flushed() >= 1);

    // The queued chunk never reaches the sink
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(sink.played().len(), 1);

    // A new utterance plays after the flush
    channel
        .emit(ChannelEvent::AudioChunk(chunk("turn-2", 6000, PLAYBACK_RATE)))
        .await;
    settle().await;
    let played = sink.played();
    assert_eq!(played.len(), 2);
    assert_eq!(played[1].turn_id, "turn-2");

    // Outbound capture ran alongside
    assert!(capture.feed(frame(1600, CAPTURE_RATE)).await);
    settle().await;
    assert_eq!(channel.sent().len(), 1);

    // Stop releases microphone and playback resources
    let stats = controller.stop().await.expect("session was active");
    assert_eq!(controller.state(), ConnectionState::Closed);
    assert_eq!(capture.stops(), 1);
    assert!(channel.closes() >= 1);
    assert_eq!(sink.closed(), 1);
    assert_eq!(stats.chunks_scheduled, 3);
    assert_eq!(stats.frames_sent, 1);

    // Transcripts do not outlive the session
    let snapshot = controller.snapshot().await;
    assert_eq!(snapshot.user_transcript, "");
    assert_eq!(snapshot.connection_state, ConnectionState::Closed);
}
