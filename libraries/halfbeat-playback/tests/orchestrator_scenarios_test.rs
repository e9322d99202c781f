//! Scenario tests for the playback orchestrator
//!
//! Each test drives the state machine through a realistic sequence of user
//! operations, resolution results and device events, playing the part of the
//! session by answering `Resolve` and `ScheduleRetry` actions by hand.

use chrono::{Duration as ChronoDuration, Utc};
use halfbeat_core::{Track, TrackId, UpstreamError};
use halfbeat_playback::{
    Action, DeviceCommand, DeviceError, DeviceErrorCode, DeviceEvent, OrchestratorState,
    PlayMode, PlaybackConfig, PlaybackEvent, PlaybackOrchestrator, ResolutionError,
    ResolutionTicket, ResolvedSource, SourceKind,
};

// ===== Test Helpers =====

fn track(id: &str) -> Track {
    Track::new(id, format!("Track {id}")).with_external_ref(format!("BV{id}"))
}

fn proxy_url(id: &str) -> String {
    format!("http://127.0.0.1:9999/audio?u={id}&sid={id}")
}

fn fresh_proxy(id: &str) -> ResolvedSource {
    ResolvedSource {
        url: proxy_url(id),
        expires_at: Some(Utc::now() + ChronoDuration::hours(2)),
        kind: SourceKind::Proxy,
        refreshed: true,
    }
}

fn cached_proxy(id: &str) -> ResolvedSource {
    ResolvedSource {
        refreshed: false,
        ..fresh_proxy(id)
    }
}

fn unreachable(id: &str) -> ResolutionError {
    ResolutionError::new(TrackId::new(id), UpstreamError::unreachable("connection refused"))
}

fn device_commands(actions: &[Action]) -> Vec<DeviceCommand> {
    actions
        .iter()
        .filter_map(|a| match a {
            Action::Device(cmd) => Some(cmd.clone()),
            _ => None,
        })
        .collect()
}

fn resolve_ticket(actions: &[Action]) -> Option<ResolutionTicket> {
    actions.iter().find_map(|a| match a {
        Action::Resolve { ticket, .. } => Some(ticket.clone()),
        _ => None,
    })
}

fn retry_ticket(actions: &[Action]) -> Option<ResolutionTicket> {
    actions.iter().find_map(|a| match a {
        Action::ScheduleRetry { ticket, .. } => Some(ticket.clone()),
        _ => None,
    })
}

fn finished_count(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, Action::Emit(PlaybackEvent::TrackFinished { .. })))
        .count()
}

fn terminal_errors(actions: &[Action]) -> usize {
    actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                Action::Emit(PlaybackEvent::Error { terminal: true, .. })
            )
        })
        .count()
}

/// Select `track` and bring it to the playing state with a 200s duration
fn start_playing(
    orchestrator: &mut PlaybackOrchestrator,
    track: Track,
    queue: Option<Vec<Track>>,
) -> Vec<Action> {
    let id = track.id.as_str().to_string();
    let mut actions = orchestrator.select_track(track, queue);
    let ticket = resolve_ticket(&actions).expect("selection resolves");
    actions.extend(orchestrator.on_resolved(&ticket, Ok(fresh_proxy(&id))));
    actions.extend(orchestrator.handle_event(DeviceEvent::LoadedMetadata { duration: 200.0 }));
    actions.extend(orchestrator.handle_event(DeviceEvent::CanPlay));
    actions.extend(orchestrator.handle_event(DeviceEvent::Play));
    actions
}

// ===== Binding =====

#[test]
fn reselecting_the_bound_track_does_not_reload_the_device() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let first = orchestrator.select_track(track("a"), None);
    let ticket = resolve_ticket(&first).unwrap();
    let bound = orchestrator.on_resolved(&ticket, Ok(fresh_proxy("a")));
    assert_eq!(
        device_commands(&bound),
        vec![DeviceCommand::SetSource(proxy_url("a")), DeviceCommand::Load]
    );

    // Same track, same URL
    let again = orchestrator.select_track(track("a"), None);
    let ticket = resolve_ticket(&again).unwrap();
    let rebound = orchestrator.on_resolved(&ticket, Ok(cached_proxy("a")));

    let all: Vec<Action> = again.into_iter().chain(rebound).collect();
    assert!(!device_commands(&all)
        .iter()
        .any(|c| matches!(c, DeviceCommand::SetSource(_) | DeviceCommand::ClearSource)));
    assert_eq!(
        orchestrator.bound(),
        Some((&TrackId::new("a"), proxy_url("a").as_str()))
    );
}

#[test]
fn switching_tracks_clears_the_device_first() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b")];
    start_playing(&mut orchestrator, track("a"), Some(queue));

    let actions = orchestrator.next();
    let commands = device_commands(&actions);

    assert_eq!(commands, vec![DeviceCommand::Pause, DeviceCommand::ClearSource]);
    assert!(actions.contains(&Action::Emit(PlaybackEvent::TrackChanged {
        track_id: TrackId::new("b"),
        previous_track_id: Some(TrackId::new("a")),
    })));
    assert_eq!(orchestrator.bound(), None);
    assert_eq!(orchestrator.state(), OrchestratorState::Binding);

    // The pause was ours; the device echo must not stop playback
    orchestrator.handle_event(DeviceEvent::Pause);
    assert!(orchestrator.is_playing());
}

#[test]
fn stale_resolution_for_previous_track_is_discarded() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b")];
    let first = orchestrator.select_track(track("a"), Some(queue));
    let stale = resolve_ticket(&first).unwrap();
    let second = orchestrator.next();
    let current = resolve_ticket(&second).unwrap();

    // Late answer for "a" arrives after the user moved on
    assert!(orchestrator.on_resolved(&stale, Ok(fresh_proxy("a"))).is_empty());
    assert_eq!(orchestrator.bound(), None);

    let actions = orchestrator.on_resolved(&current, Ok(fresh_proxy("b")));
    assert!(device_commands(&actions).contains(&DeviceCommand::SetSource(proxy_url("b"))));
    assert_eq!(orchestrator.current_track().unwrap().id, TrackId::new("b"));
}

#[test]
fn stale_resolution_for_same_track_is_discarded() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let stale = resolve_ticket(&orchestrator.select_track(track("a"), None)).unwrap();
    let current = resolve_ticket(&orchestrator.select_track(track("a"), None)).unwrap();
    assert_ne!(stale, current);

    assert!(orchestrator.on_resolved(&stale, Err(unreachable("a"))).is_empty());
    assert_eq!(orchestrator.recovery().ledger().count(&TrackId::new("a")), 0);
    assert_eq!(orchestrator.pending_resolution(), Some(&current));
}

#[test]
fn fresh_url_is_persisted_and_copied_into_queue() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b"), track("a")];
    let actions = start_playing(&mut orchestrator, track("a"), Some(queue));

    let persisted = actions.iter().find_map(|a| match a {
        Action::PersistTrack(t) if t.stream_url.is_some() => Some(t.clone()),
        _ => None,
    });
    assert_eq!(
        persisted.and_then(|t| t.stream_url),
        Some(proxy_url("a"))
    );

    // Every copy of the track in the queue sees the new URL
    let copies: Vec<_> = orchestrator
        .queue()
        .tracks()
        .iter()
        .filter(|t| t.id == TrackId::new("a"))
        .map(|t| t.stream_url.clone())
        .collect();
    assert_eq!(copies, vec![Some(proxy_url("a")), Some(proxy_url("a"))]);
}

// ===== Retry Bound =====

#[test]
fn always_failing_resolution_retries_twice_then_gives_up() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let mut all = orchestrator.select_track(track("a"), None);
    let mut ticket = resolve_ticket(&all).unwrap();

    loop {
        let actions = orchestrator.on_resolved(&ticket, Err(unreachable("a")));
        all.extend(actions.clone());
        let Some(retry) = retry_ticket(&actions) else {
            break;
        };
        let actions = orchestrator.on_retry_due(&retry);
        ticket = resolve_ticket(&actions).expect("retry resolves again");
        all.extend(actions);
    }

    let retries = all
        .iter()
        .filter(|a| matches!(a, Action::ScheduleRetry { .. }))
        .count();
    assert_eq!(retries, 2);
    assert_eq!(terminal_errors(&all), 1);
    assert!(!orchestrator.is_playing());
    assert_eq!(orchestrator.state(), OrchestratorState::Idle);
    assert!(orchestrator.status().is_some());
    assert_eq!(orchestrator.pending_retry(), None);
}

#[test]
fn retry_attempts_are_reported_in_order() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let ticket = resolve_ticket(&orchestrator.select_track(track("a"), None)).unwrap();
    let actions = orchestrator.on_resolved(&ticket, Err(unreachable("a")));

    assert!(actions.contains(&Action::Emit(PlaybackEvent::RetryScheduled {
        track_id: TrackId::new("a"),
        attempt: 1,
        delay_ms: 500,
    })));
    assert_eq!(orchestrator.state(), OrchestratorState::ErrorHandling);
}

#[test]
fn track_without_any_source_fails_immediately() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let bare = Track::new("a", "No Source");
    let ticket = resolve_ticket(&orchestrator.select_track(bare, None)).unwrap();
    let actions = orchestrator.on_resolved(
        &ticket,
        Err(ResolutionError::new(
            TrackId::new("a"),
            halfbeat_playback::ResolutionCause::NoSource,
        )),
    );

    assert!(retry_ticket(&actions).is_none());
    assert_eq!(terminal_errors(&actions), 1);
}

#[test]
fn give_up_in_single_repeat_moves_to_next_track() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::SingleRepeat);
    let queue = vec![track("a"), track("b")];
    let mut ticket =
        resolve_ticket(&orchestrator.select_track(track("a"), Some(queue))).unwrap();

    let last = loop {
        let actions = orchestrator.on_resolved(&ticket, Err(unreachable("a")));
        match retry_ticket(&actions) {
            Some(retry) => {
                ticket = resolve_ticket(&orchestrator.on_retry_due(&retry)).unwrap();
            }
            None => break actions,
        }
    };

    assert_eq!(terminal_errors(&last), 1);
    let next = resolve_ticket(&last).expect("skips to the next track");
    assert_eq!(next.track_id, TrackId::new("b"));
    assert!(orchestrator.is_playing());
}

#[test]
fn give_up_in_sequential_stays_on_track() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b")];
    let mut ticket =
        resolve_ticket(&orchestrator.select_track(track("a"), Some(queue))).unwrap();

    let last = loop {
        let actions = orchestrator.on_resolved(&ticket, Err(unreachable("a")));
        match retry_ticket(&actions) {
            Some(retry) => {
                ticket = resolve_ticket(&orchestrator.on_retry_due(&retry)).unwrap();
            }
            None => break actions,
        }
    };

    assert!(resolve_ticket(&last).is_none());
    assert_eq!(orchestrator.current_track().unwrap().id, TrackId::new("a"));
}

#[test]
fn fault_after_resuming_a_given_up_track_is_reported_again() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    start_playing(&mut orchestrator, track("a"), None);

    let first = orchestrator.handle_event(DeviceEvent::Error(DeviceError::new(
        DeviceErrorCode::Unknown,
        "x",
    )));
    assert_eq!(terminal_errors(&first), 1);
    assert!(orchestrator.status().is_some());
    assert!(!orchestrator.recovery().ledger().is_handling(&TrackId::new("a")));

    // Still bound, so play resumes the device without re-resolving
    let resumed = orchestrator.play();
    assert!(device_commands(&resumed).contains(&DeviceCommand::Play));
    assert!(resolve_ticket(&resumed).is_none());
    assert_eq!(orchestrator.status(), None);
    orchestrator.handle_event(DeviceEvent::Play);

    let second = orchestrator.handle_event(DeviceEvent::Error(DeviceError::new(
        DeviceErrorCode::Unknown,
        "x",
    )));
    assert_eq!(terminal_errors(&second), 1);
    assert!(!orchestrator.is_playing());
    assert!(orchestrator.status().is_some());
}

#[test]
fn failing_local_copy_is_retried_as_stream() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let ticket = resolve_ticket(&orchestrator.select_track(track("a"), None)).unwrap();
    let local = ResolvedSource {
        url: "http://127.0.0.1:9999/local/a.m4a".to_string(),
        expires_at: Some(Utc::now() + ChronoDuration::days(365)),
        kind: SourceKind::Local,
        refreshed: false,
    };
    let bound = orchestrator.on_resolved(&ticket, Ok(local));
    // Local URLs are never stored as the track's stream
    assert!(!bound.iter().any(|a| matches!(a, Action::PersistTrack(_))));

    let actions = orchestrator.handle_event(DeviceEvent::Error(DeviceError::new(
        DeviceErrorCode::SrcNotSupported,
        "unsupported",
    )));
    let persisted = actions.iter().find_map(|a| match a {
        Action::PersistTrack(t) => Some(t.clone()),
        _ => None,
    });
    assert!(persisted.is_some_and(|t| t.skip_local));
    assert!(device_commands(&actions).contains(&DeviceCommand::ClearSource));

    // A second fault for the dead source changes nothing
    let duplicate = orchestrator.handle_event(DeviceEvent::Error(DeviceError::new(
        DeviceErrorCode::Network,
        "late",
    )));
    assert!(duplicate.is_empty());

    let retry = retry_ticket(&actions).unwrap();
    let actions = orchestrator.on_retry_due(&retry);
    let resolving = actions.iter().find_map(|a| match a {
        Action::Resolve { track, .. } => Some(track.clone()),
        _ => None,
    });
    assert!(resolving.is_some_and(|t| t.skip_local));
}

#[test]
fn aborted_fetch_is_ignored() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    start_playing(&mut orchestrator, track("a"), None);

    let actions = orchestrator.handle_event(DeviceEvent::Error(DeviceError::new(
        DeviceErrorCode::Aborted,
        "aborted",
    )));

    assert!(actions.is_empty());
    assert!(orchestrator.is_playing());
    assert_eq!(orchestrator.recovery().ledger().count(&TrackId::new("a")), 0);
}

// ===== Interval End =====

#[test]
fn interval_end_is_handled_exactly_once() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::SingleRepeat);
    start_playing(&mut orchestrator, track("a").with_skip(10.0, 60.0), None);
    assert_eq!(orchestrator.interval().end, 60.0);

    let mut actions = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 60.4 });
    // Updates and the natural end still in flight from before the seek
    actions.extend(orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 60.6 }));
    actions.extend(orchestrator.handle_event(DeviceEvent::Ended));

    assert_eq!(finished_count(&actions), 1);
}

#[test]
fn interval_end_rewinds_and_pauses_before_routing() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::SingleRepeat);
    start_playing(&mut orchestrator, track("a").with_skip(10.0, 60.0), None);

    let actions = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 61.0 });

    assert_eq!(
        device_commands(&actions),
        vec![
            DeviceCommand::Seek(10.0),
            DeviceCommand::Pause,
            DeviceCommand::Seek(10.0),
            DeviceCommand::Play,
        ]
    );
}

#[test]
fn playing_again_after_end_rearms_the_latch() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::SingleRepeat);
    start_playing(&mut orchestrator, track("a").with_skip(10.0, 60.0), None);

    let first = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 61.0 });
    orchestrator.handle_event(DeviceEvent::Pause);
    orchestrator.handle_event(DeviceEvent::Play);
    orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 30.0 });
    let second = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 61.0 });

    assert_eq!(finished_count(&first), 1);
    assert_eq!(finished_count(&second), 1);
}

#[test]
fn progress_before_duration_does_not_trigger_end() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let ticket = resolve_ticket(&orchestrator.select_track(track("a").with_skip(0.0, 5.0), None))
        .unwrap();
    orchestrator.on_resolved(&ticket, Ok(fresh_proxy("a")));

    let actions = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 42.0 });

    assert_eq!(finished_count(&actions), 0);
    assert_eq!(orchestrator.progress(), 42.0);
}

// ===== Queue Routing =====

#[test]
fn single_track_queue_repeats_in_every_mode() {
    for mode in [PlayMode::Sequential, PlayMode::Shuffle, PlayMode::SingleRepeat] {
        let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
        orchestrator.set_play_mode(mode);
        start_playing(&mut orchestrator, track("a").with_skip(10.0, 60.0), None);

        let mut actions = orchestrator.handle_event(DeviceEvent::TimeUpdate { position: 61.0 });
        if let Some(ticket) = resolve_ticket(&actions) {
            actions.extend(orchestrator.on_resolved(&ticket, Ok(cached_proxy("a"))));
        }
        let commands = device_commands(&actions);

        assert_eq!(commands.last(), Some(&DeviceCommand::Play), "mode {mode:?}");
        assert!(
            !commands.iter().any(|c| matches!(c, DeviceCommand::SetSource(_))),
            "mode {mode:?} reloaded the device"
        );
        assert_eq!(orchestrator.current_track().unwrap().id, TrackId::new("a"));
        assert_eq!(orchestrator.state(), OrchestratorState::Playing);
    }
}

#[test]
fn single_repeat_replays_on_natural_end_but_advances_on_next() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::SingleRepeat);
    let queue = vec![track("a"), track("b")];
    start_playing(&mut orchestrator, track("a"), Some(queue));

    let natural = orchestrator.handle_event(DeviceEvent::Ended);
    assert!(resolve_ticket(&natural).is_none());
    assert_eq!(orchestrator.current_track().unwrap().id, TrackId::new("a"));
    assert_eq!(device_commands(&natural).last(), Some(&DeviceCommand::Play));

    let manual = orchestrator.next();
    assert_eq!(resolve_ticket(&manual).unwrap().track_id, TrackId::new("b"));
    assert_eq!(orchestrator.queue().current_index(), Some(1));
}

#[test]
fn sequential_natural_end_wraps_around() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b")];
    start_playing(&mut orchestrator, track("b"), Some(queue));

    let actions = orchestrator.handle_event(DeviceEvent::Ended);

    assert_eq!(finished_count(&actions), 1);
    assert_eq!(resolve_ticket(&actions).unwrap().track_id, TrackId::new("a"));
}

#[test]
fn shuffle_next_stays_within_queue() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.set_play_mode(PlayMode::Shuffle);
    let queue: Vec<Track> = ["a", "b", "c", "d"].iter().map(|id| track(id)).collect();
    orchestrator.select_track(track("a"), Some(queue));

    for _ in 0..20 {
        let actions = orchestrator.next();
        let ticket = resolve_ticket(&actions).unwrap();
        let index = orchestrator.queue().current_index().unwrap();
        assert!(index < 4);
        assert_eq!(orchestrator.queue().get(index).unwrap().id, ticket.track_id);
    }
}

#[test]
fn selecting_track_outside_queue_falls_back_to_first_index() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.select_track(track("x"), Some(vec![track("a"), track("b")]));

    assert_eq!(orchestrator.queue().current_index(), Some(0));
    assert_eq!(orchestrator.current_track().unwrap().id, TrackId::new("x"));
}

#[test]
fn play_at_out_of_bounds_is_rejected() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    orchestrator.select_track(track("a"), Some(vec![track("a"), track("b")]));

    assert!(orchestrator.play_at(5).is_err());
    assert_eq!(orchestrator.queue().current_index(), Some(0));
}

#[test]
fn reorder_keeps_current_track_and_persists_queue() {
    let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
    let queue = vec![track("a"), track("b"), track("c")];
    orchestrator.select_track(track("b"), Some(queue));

    let actions = orchestrator.reorder_queue(0, 2).unwrap();

    assert_eq!(orchestrator.queue().current_index(), Some(0));
    let snapshot = actions.iter().find_map(|a| match a {
        Action::PersistQueue(s) => Some(s.clone()),
        _ => None,
    });
    let snapshot = snapshot.unwrap();
    assert_eq!(
        snapshot.track_ids,
        vec![TrackId::new("b"), TrackId::new("c"), TrackId::new("a")]
    );
    assert_eq!(snapshot.current_index, Some(0));
}
