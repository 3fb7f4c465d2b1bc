//! End-to-end behaviour of the playback session against the scripted embed
//! player and a recording store, on a paused tokio clock.

use std::sync::Arc;
use std::time::Duration;

use lumio_core::prelude::*;
use lumio_core::testing::{RecordingStore, ScriptedEmbed};

fn sample_video(duration: u32) -> VideoDescriptor {
    VideoDescriptor::new(
        VideoId::new(),
        EmbedId::new("dQw4w9WgXcQ").unwrap(),
        duration,
    )
    .unwrap()
}

async fn start_session(
    embed: &ScriptedEmbed,
    store: &Arc<RecordingStore>,
    user_id: UserId,
    video: &VideoDescriptor,
) -> PlaybackSession {
    PlaybackSession::start_with_library(
        Arc::new(embed.clone()),
        user_id,
        video.clone(),
        Arc::clone(store) as Arc<dyn ProgressStore>,
        SessionOptions::default(),
    )
    .await
    .expect("session starts")
}

/// Let the driver drain queued events without moving the clock much.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

/// Advance past the next sampling tick.
async fn next_tick() {
    tokio::time::sleep(Duration::from_secs(1)).await;
}

async fn begin_playback(embed: &ScriptedEmbed, duration: f64) {
    embed.emit_ready(duration);
    embed.emit_state(
        lumio_core::adapter::embed::EmbedPlaybackState::Playing,
    );
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn watch_close_reopen_resumes_with_eligibility() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(185.0);
    next_tick().await;

    let report = session.shutdown().await.unwrap();
    assert!(matches!(
        report.final_flush,
        FinalFlush::Flushed | FinalFlush::NotNeeded
    ));

    let stored = store.get(user_id, video.id).expect("record persisted");
    assert_eq!(stored.position_seconds, 185);
    assert_eq!(stored.percent_watched, 31);
    assert!(!stored.completed);

    // Reopening resumes from the stored position, eligible immediately.
    let embed2 = ScriptedEmbed::ready();
    let session2 = start_session(&embed2, &store, user_id, &video).await;
    let projection = session2.projection();
    assert_eq!(projection.position_seconds, 185);
    assert!(projection.skip_eligible);
    assert_eq!(projection.remaining_lock_seconds, 0);

    let report = session2.shutdown().await.unwrap();
    assert_eq!(report.final_flush, FinalFlush::NotNeeded);
}

#[tokio::test(start_paused = true)]
async fn teardown_flushes_exactly_once_when_dirty() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(100.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    // Advance again; too soon for another autosave.
    embed.set_position(150.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    let report = session.shutdown().await.unwrap();
    assert_eq!(report.final_flush, FinalFlush::Flushed);
    assert_eq!(store.upsert_attempts(), 2);
    assert_eq!(
        store.get(user_id, video.id).unwrap().position_seconds,
        150
    );
}

#[tokio::test(start_paused = true)]
async fn teardown_issues_no_flush_when_clean() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(42.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    let report = session.shutdown().await.unwrap();
    assert_eq!(report.final_flush, FinalFlush::NotNeeded);
    assert_eq!(store.upsert_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_handle_still_flushes() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(77.0);
    next_tick().await;
    embed.set_position(90.0);
    next_tick().await;

    drop(session);
    settle().await;

    assert_eq!(
        store.get(user_id, video.id).unwrap().position_seconds,
        90
    );
}

#[tokio::test(start_paused = true)]
async fn out_of_order_flush_completion_never_regresses_the_store() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    store.set_write_delay(Duration::from_secs(3));
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    // First flush starts carrying 10 and stays in flight for 3s.
    embed.set_position(10.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    // Progress advances while the write is in flight: no second write yet.
    embed.set_position(20.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    // The in-flight write settles, then exactly one coalesced follow-up
    // carries the freshest position.
    tokio::time::sleep(Duration::from_secs(7)).await;
    assert_eq!(store.upsert_attempts(), 2);

    let landed = store.landed_positions();
    assert_eq!(landed, vec![10, 20]);
    assert!(landed.windows(2).all(|pair| pair[0] <= pair[1]));

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn transient_store_failure_retries_on_a_later_tick() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    store.fail_next(StoreError::Transient("connect timeout".to_string()));
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(10.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);
    assert!(store.landed_positions().is_empty());

    // Still dirty; the retry waits out the save interval instead of
    // hammering the store every second.
    embed.set_position(15.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(store.upsert_attempts(), 2);
    assert_eq!(store.landed_positions(), vec![15]);

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn rejected_write_stops_flushing_but_keeps_tracking() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    store.fail_next(StoreError::Rejected("video row is gone".to_string()));
    let user_id = UserId::new();
    let video = sample_video(600);

    let mut session = start_session(&embed, &store, user_id, &video).await;
    let mut events = session.take_events().unwrap();
    begin_playback(&embed, 600.0).await;

    embed.set_position(10.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    // Surfaced exactly once.
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::SaveRejected { .. })
    ));

    // Local tracking continues, flushing does not.
    embed.set_position(100.0);
    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(store.upsert_attempts(), 1);
    assert_eq!(session.projection().position_seconds, 100);

    let report = session.shutdown().await.unwrap();
    assert_eq!(report.final_flush, FinalFlush::NotNeeded);
    assert_eq!(store.upsert_attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn completion_forces_an_immediate_flush() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(100.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    // Within the completion slack of the end: flushes without waiting for
    // the autosave interval.
    embed.set_position(596.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 2);

    let stored = store.get(user_id, video.id).unwrap();
    assert!(stored.completed);
    assert_eq!(stored.position_seconds, 596);

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn ended_event_completes_at_full_duration() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 600.0).await;

    embed.set_position(300.0);
    next_tick().await;

    embed.emit_state(lumio_core::adapter::embed::EmbedPlaybackState::Ended);
    settle().await;

    let stored = store.get(user_id, video.id).unwrap();
    assert!(stored.completed);
    assert_eq!(stored.position_seconds, 600);
    assert_eq!(stored.percent_watched, 100);

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn skip_gate_denies_then_allows_forward_seeks() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(3600);

    let mut session = start_session(&embed, &store, user_id, &video).await;
    let mut events = session.take_events().unwrap();
    begin_playback(&embed, 3600.0).await;

    embed.set_position(60.0);
    next_tick().await;

    // Ahead of the gate: denied with the minutes hint, nothing forwarded.
    match session.seek(500).await.unwrap() {
        SeekDecision::Denied {
            remaining_lock_seconds,
            hint_minutes,
        } => {
            assert_eq!(remaining_lock_seconds, 120);
            assert_eq!(hint_minutes, 2);
        }
        other => panic!("expected denial, got {other:?}"),
    }
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::SkipDenied { .. })
    ));
    assert!(!embed.commands().iter().any(|c| c == "seek:500"));

    // Rewatching is never restricted.
    assert!(matches!(
        session.seek(30).await.unwrap(),
        SeekDecision::Allowed { target_seconds: 30 }
    ));
    assert!(embed.commands().iter().any(|c| c == "seek:30"));

    // Past the gate the same forward seek goes through.
    embed.set_position(180.0);
    next_tick().await;
    assert!(matches!(
        session.seek(500).await.unwrap(),
        SeekDecision::Allowed {
            target_seconds: 500
        }
    ));
    assert!(embed.commands().iter().any(|c| c == "seek:500"));

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn player_error_flushes_last_known_position_and_surfaces() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let mut session = start_session(&embed, &store, user_id, &video).await;
    let mut events = session.take_events().unwrap();
    begin_playback(&embed, 600.0).await;

    embed.set_position(50.0);
    next_tick().await;
    assert_eq!(store.upsert_attempts(), 1);

    embed.set_position(60.0);
    next_tick().await;

    embed.emit_error(101);
    settle().await;

    // Best-effort flush of the last sampled position.
    assert_eq!(store.upsert_attempts(), 2);
    assert_eq!(
        store.get(user_id, video.id).unwrap().position_seconds,
        60
    );

    let mut saw_player_failed = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::PlayerFailed { .. }) {
            saw_player_failed = true;
        }
    }
    assert!(saw_player_failed);

    let report = session.shutdown().await.unwrap();
    assert_eq!(report.final_flush, FinalFlush::NotNeeded);
}

#[tokio::test(start_paused = true)]
async fn short_video_gate_uses_the_fractional_floor() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(30);

    let session = start_session(&embed, &store, user_id, &video).await;
    begin_playback(&embed, 30.0).await;

    // Gate for a 30s video is min(180, 3) = 3 seconds.
    embed.set_position(3.0);
    next_tick().await;
    assert!(session.projection().skip_eligible);
    assert!(matches!(
        session.seek(25).await.unwrap(),
        SeekDecision::Allowed { target_seconds: 25 }
    ));

    session.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn projection_updates_flow_through_the_watch_channel() {
    let embed = ScriptedEmbed::ready();
    let store = Arc::new(RecordingStore::new());
    let user_id = UserId::new();
    let video = sample_video(600);

    let session = start_session(&embed, &store, user_id, &video).await;
    let mut updates = session.subscribe();
    begin_playback(&embed, 600.0).await;

    embed.set_position(120.0);
    next_tick().await;

    updates.changed().await.unwrap();
    let projection = *updates.borrow_and_update();
    assert_eq!(projection.position_seconds, 120);
    assert_eq!(projection.percent_watched, 20);
    assert!(projection.skip_eligible);

    session.shutdown().await.unwrap();
}
