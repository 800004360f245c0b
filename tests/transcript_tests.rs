// Tests for transcript accumulation and the display-grace clear

use std::time::Duration;
use voxbridge::channel::TranscriptSide;
use voxbridge::session::TranscriptAccumulator;

#[tokio::test]
async fn test_fragments_concatenate_per_side() {
    let transcript = TranscriptAccumulator::new(Duration::from_secs(5));

    transcript.append(TranscriptSide::User, "Hola").await;
    transcript.append(TranscriptSide::User, " amigo").await;
    transcript.append(TranscriptSide::Ai, "Hello").await;
    transcript.append(TranscriptSide::Ai, " friend").await;

    assert_eq!(
        transcript.snapshot().await,
        ("Hola amigo".to_string(), "Hello friend".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn test_turn_complete_clears_after_grace() {
    let transcript = TranscriptAccumulator::new(Duration::from_secs(5));

    transcript.append(TranscriptSide::User, "Hola").await;
    transcript.append(TranscriptSide::Ai, "Hello").await;
    transcript.on_turn_complete().await;

    // Still visible inside the grace interval
    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transcript.snapshot().await.0, "Hola");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(
        transcript.snapshot().await,
        (String::new(), String::new())
    );
}

#[tokio::test(start_paused = true)]
async fn test_append_inside_grace_starts_fresh_turn() {
    let transcript = TranscriptAccumulator::new(Duration::from_secs(5));

    transcript.append(TranscriptSide::User, "vieja frase").await;
    transcript.on_turn_complete().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    // A new turn begins inside the grace interval: the pending clear is
    // cancelled and the buffers restart from empty instead of accumulating
    // stale text.
    transcript.append(TranscriptSide::User, "Nuevo").await;
    assert_eq!(transcript.snapshot().await.0, "Nuevo");

    // The stale grace timer must not wipe the new turn
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transcript.snapshot().await.0, "Nuevo");
}

#[tokio::test(start_paused = true)]
async fn test_repeated_turn_complete_is_safe() {
    let transcript = TranscriptAccumulator::new(Duration::from_secs(5));

    transcript.append(TranscriptSide::Ai, "done").await;
    transcript.on_turn_complete().await;
    transcript.on_turn_complete().await;

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(transcript.snapshot().await.1, "");
}

#[tokio::test]
async fn test_reset_drops_everything() {
    let transcript = TranscriptAccumulator::new(Duration::from_secs(5));

    transcript.append(TranscriptSide::User, "uno").await;
    transcript.append(TranscriptSide::Ai, "one").await;
    transcript.on_turn_complete().await;
    transcript.reset().await;

    assert_eq!(
        transcript.snapshot().await,
        (String::new(), String::new())
    );
}
