//! Lookahead queue behavior: window builds, slides, and exhaustion.

mod helpers;

use helpers::{fast_tuning, wait_for_event, TestHarness};
use std::time::Duration;
use tonearm_common::events::{PlayerEvent, PlayerState};
use uuid::Uuid;

const TRACK_MS: u64 = 250;

fn library() -> TestHarness {
    TestHarness::new(
        &["a.wav", "b.wav", "c.wav", "d.wav", "e.wav", "f.wav", "g.wav"],
        TRACK_MS,
        fast_tuning(),
    )
}

#[tokio::test]
async fn play_builds_window_from_library_order() {
    let h = library();
    let c = h.track("c.wav");

    h.controller.play(c.id).await.unwrap();

    assert_eq!(h.now_playing_name().as_deref(), Some("c.wav"));
    assert_eq!(
        h.queue_names(),
        vec!["c.wav", "d.wav", "e.wav", "f.wav", "g.wav"]
    );
}

#[tokio::test]
async fn playing_a_queued_track_keeps_the_queue_order() {
    let h = library();
    h.controller.play(h.track("c.wav").id).await.unwrap();
    let before = h.queue_names();

    h.controller.play(h.track("e.wav").id).await.unwrap();

    assert_eq!(h.queue_names(), before);
    assert_eq!(h.now_playing_name().as_deref(), Some("e.wav"));
}

#[tokio::test]
async fn natural_end_slides_the_window() {
    let h = library();
    let mut rx = h.state.subscribe_events();
    let f = h.track("f.wav");

    h.controller.play(f.id).await.unwrap();
    assert_eq!(h.queue_names(), vec!["f.wav", "g.wav"]);

    let completed = wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::TrackCompleted { .. })
    })
    .await
    .expect("no TrackCompleted");
    match completed {
        PlayerEvent::TrackCompleted { track_id, .. } => assert_eq!(track_id, f.id),
        _ => unreachable!(),
    }

    wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::PlaybackStarted { .. })
    })
    .await
    .expect("no PlaybackStarted for the next track");

    assert_eq!(h.now_playing_name().as_deref(), Some("g.wav"));
    assert_eq!(h.queue_names(), vec!["g.wav"]);
}

#[tokio::test]
async fn queue_exhaustion_stops_and_keeps_the_last_entry() {
    let h = library();
    let mut rx = h.state.subscribe_events();
    let g = h.track("g.wav");

    // Last library track: the queue is just [g]
    h.controller.play(g.id).await.unwrap();
    assert_eq!(h.queue_names(), vec!["g.wav"]);

    wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::TrackCompleted { .. })
    })
    .await
    .expect("no TrackCompleted");
    wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::PlaybackStopped { .. })
    })
    .await
    .expect("no PlaybackStopped");

    assert_eq!(h.now_playing_name(), None);
    assert_eq!(h.queue_names(), vec!["g.wav"]);
    assert_eq!(h.state.player_state().await, PlayerState::Idle);
}

#[tokio::test]
async fn exactly_one_advance_per_ending() {
    let h = library();
    let mut rx = h.state.subscribe_events();

    h.controller.play(h.track("e.wav").id).await.unwrap();

    wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::TrackCompleted { .. })
    })
    .await
    .expect("no TrackCompleted");
    wait_for_event(&mut rx, Duration::from_secs(3), |e| {
        matches!(e, PlayerEvent::PlaybackStarted { .. })
    })
    .await
    .expect("no PlaybackStarted");

    // One ending advances by exactly one track
    assert_eq!(h.now_playing_name().as_deref(), Some("f.wav"));
}

#[tokio::test]
async fn manual_skip_advances_without_a_completion_report() {
    let h = library();
    h.controller.play(h.track("c.wav").id).await.unwrap();

    let mut rx = h.state.subscribe_events();
    h.controller.next().await;

    assert_eq!(h.now_playing_name().as_deref(), Some("d.wav"));
    assert_eq!(h.queue_names(), vec!["d.wav", "e.wav", "f.wav", "g.wav"]);

    // A skip is not a natural ending
    let completed = wait_for_event(&mut rx, Duration::from_millis(100), |e| {
        matches!(e, PlayerEvent::TrackCompleted { .. })
    })
    .await;
    assert!(completed.is_none());
}

#[tokio::test]
async fn unknown_track_is_an_error() {
    let h = library();
    assert!(h.controller.play(Uuid::new_v4()).await.is_err());
    assert_eq!(h.now_playing_name(), None);
}

#[tokio::test]
async fn redundant_pause_and_resume_emit_no_events() {
    let h = library();
    h.controller.play(h.track("a.wav").id).await.unwrap();

    let mut rx = h.state.subscribe_events();
    h.controller.pause().await;
    h.controller.pause().await;

    wait_for_event(&mut rx, Duration::from_millis(500), |e| {
        matches!(e, PlayerEvent::PlaybackPaused { .. })
    })
    .await
    .expect("no PlaybackPaused");
    let second = wait_for_event(&mut rx, Duration::from_millis(100), |e| {
        matches!(e, PlayerEvent::PlaybackPaused { .. })
    })
    .await;
    assert!(second.is_none());

    // Resume once; a second resume is silent
    h.controller.resume().await;
    h.controller.resume().await;
    wait_for_event(&mut rx, Duration::from_millis(500), |e| {
        matches!(e, PlayerEvent::PlaybackResumed { .. })
    })
    .await
    .expect("no PlaybackResumed");
    let second = wait_for_event(&mut rx, Duration::from_millis(100), |e| {
        matches!(e, PlayerEvent::PlaybackResumed { .. })
    })
    .await;
    assert!(second.is_none());
}

#[tokio::test]
async fn volume_event_echoes_the_clamped_value() {
    let h = library();
    let mut rx = h.state.subscribe_events();

    assert_eq!(h.controller.set_volume(1.5), 1.0);

    let event = wait_for_event(&mut rx, Duration::from_millis(500), |e| {
        matches!(e, PlayerEvent::VolumeChanged { .. })
    })
    .await
    .expect("no VolumeChanged");
    match event {
        PlayerEvent::VolumeChanged { volume, .. } => assert_eq!(volume, 1.0),
        _ => unreachable!(),
    }
}
