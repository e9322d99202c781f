//! Playback orchestrator - core state machine
//!
//! Owns the "now playing" slot and keeps the device consistent with the
//! logical session. Every input (user operation, device event, resolution
//! result, retry timer) is a synchronous call that returns the side effects
//! to perform as [`Action`]s; the async session executes them. This keeps all
//! ordering decisions in one place and makes the machine testable without a
//! runtime.
//!
//! Consistency rules:
//! - Binding is idempotent on `(track id, url)`
//! - Before a different track is bound the device is paused and cleared
//! - Resolution results and retries carry a [`ResolutionTicket`]; results for
//!   a superseded ticket are dropped
//! - Pauses issued by the orchestrator itself are not mirrored into the
//!   intended play state
//! - Reaching the interval end is routed through the queue exactly once

use crate::{
    device::{DeviceCommand, DeviceEvent},
    error::{DeviceError, ResolutionError, Result},
    events::PlaybackEvent,
    interval::{validate_skip_bounds, Interval},
    queue::{NaturalEnd, QueueManager},
    recovery::{ErrorRecovery, RecoveryAction, RecoveryContext},
    resolver::ResolvedSource,
    source::SourceKind,
    types::{OrchestratorState, PlayMode, PlaybackConfig, PlayerSnapshot},
    volume::Volume,
};
use chrono::Utc;
use halfbeat_core::{QueueSnapshot, Track, TrackId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Identifies one resolution attempt
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionTicket {
    /// Monotonic attempt counter
    pub generation: u64,

    /// Track the attempt is for
    pub track_id: TrackId,
}

/// Side effect requested by the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send a command to the device
    Device(DeviceCommand),

    /// Resolve a source for the track and report back with the ticket
    Resolve {
        /// Ticket to hand back with the result
        ticket: ResolutionTicket,
        /// Track to resolve
        track: Track,
    },

    /// Fire `on_retry_due` with the ticket after the delay, replacing any
    /// pending retry
    ScheduleRetry {
        /// Ticket to hand back
        ticket: ResolutionTicket,
        /// Delay before firing
        delay: Duration,
    },

    /// Drop the pending retry timer
    CancelRetry,

    /// Persist the track now
    PersistTrack(Track),

    /// Persist the track after a quiet period
    PersistTrackDebounced(Track),

    /// Persist queue state after a quiet period
    PersistQueue(QueueSnapshot),

    /// Append a play-history entry
    RecordPlayback {
        /// Playlist the track was started from
        favorite_context: Option<String>,
        /// Track that started
        track_id: TrackId,
    },

    /// Publish an event to observers
    Emit(PlaybackEvent),
}

/// Playback orchestrator
pub struct PlaybackOrchestrator {
    config: PlaybackConfig,
    queue: QueueManager,
    recovery: ErrorRecovery,
    volume: Volume,
    state: OrchestratorState,

    // Working copy of the current track
    current: Option<Track>,

    // Intended play state (what the UI shows)
    intended_playing: bool,

    // Last known device play state
    device_playing: bool,

    progress: f64,
    duration: Option<f64>,
    interval: Interval,
    status: Option<String>,

    generation: u64,
    pending: Option<ResolutionTicket>,
    pending_retry: Option<ResolutionTicket>,

    // (track id, url) currently bound to the device
    last_bound: Option<(TrackId, String)>,
    bound_kind: Option<SourceKind>,

    // Pause events still expected from our own silent pauses
    suppressed_pauses: u32,

    // Set once the interval end was handled; cleared by play/seek/rebind
    ended_latch: bool,

    favorite_context: Option<String>,
}

impl PlaybackOrchestrator {
    /// Create an orchestrator with an empty queue
    pub fn new(config: PlaybackConfig) -> Self {
        let queue = QueueManager::new(config.play_mode);
        Self::with_queue(config, queue)
    }

    /// Create an orchestrator around an existing queue
    pub fn with_queue(config: PlaybackConfig, mut queue: QueueManager) -> Self {
        queue.set_mode(config.play_mode);
        Self {
            recovery: ErrorRecovery::new(config.max_retries),
            volume: Volume::new(config.volume),
            queue,
            config,
            state: OrchestratorState::Idle,
            current: None,
            intended_playing: false,
            device_playing: false,
            progress: 0.0,
            duration: None,
            interval: Interval::provisional(),
            status: None,
            generation: 0,
            pending: None,
            pending_retry: None,
            last_bound: None,
            bound_kind: None,
            suppressed_pauses: 0,
            ended_latch: false,
            favorite_context: None,
        }
    }

    /// Commands to bring a fresh device in line with the session
    pub fn initial_actions(&self) -> Vec<Action> {
        vec![Action::Device(DeviceCommand::SetVolume(
            self.volume.effective(),
        ))]
    }

    // ===== State =====

    /// Orchestrator state
    pub fn state(&self) -> OrchestratorState {
        self.state
    }

    /// Intended play state
    pub fn is_playing(&self) -> bool {
        self.intended_playing
    }

    /// Working copy of the current track
    pub fn current_track(&self) -> Option<&Track> {
        self.current.as_ref()
    }

    /// Active playback window
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Last reported position
    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Media duration, once known
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Play queue
    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    /// Error recovery state
    pub fn recovery(&self) -> &ErrorRecovery {
        &self.recovery
    }

    /// Volume state
    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    /// Status line
    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    /// Track id and URL currently bound to the device
    pub fn bound(&self) -> Option<(&TrackId, &str)> {
        self.last_bound
            .as_ref()
            .map(|(id, url)| (id, url.as_str()))
    }

    /// Resolution currently awaited
    pub fn pending_resolution(&self) -> Option<&ResolutionTicket> {
        self.pending.as_ref()
    }

    /// Retry currently scheduled
    pub fn pending_retry(&self) -> Option<&ResolutionTicket> {
        self.pending_retry.as_ref()
    }

    /// Observable state
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            state: self.state,
            queue: self.queue.tracks().to_vec(),
            current_index: self.queue.current_index(),
            current_track: self.current.clone(),
            play_mode: self.queue.mode(),
            is_playing: self.intended_playing,
            volume: self.volume.level(),
            muted: self.volume.is_muted(),
            progress: self.progress,
            duration: self.duration,
            interval: self.interval,
            status: self.status.clone(),
            bound_url: self.last_bound.as_ref().map(|(_, url)| url.clone()),
        }
    }

    // ===== Navigation =====

    /// Make `track` current and start playing it
    ///
    /// When `queue` is given it replaces the play queue first.
    pub fn select_track(&mut self, track: Track, queue: Option<Vec<Track>>) -> Vec<Action> {
        let mut actions = Vec::new();
        let replaced = queue.is_some();
        self.queue.select_track(&track, queue);
        if replaced {
            actions.push(Action::Emit(PlaybackEvent::QueueChanged {
                length: self.queue.len(),
            }));
        }
        self.navigate_to(track, &mut actions);
        actions
    }

    /// Manual skip forward
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(track) = self.queue.next().and_then(|i| self.queue.get(i)).cloned() {
            self.navigate_to(track, &mut actions);
        }
        actions
    }

    /// Manual skip backward
    pub fn previous(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        if let Some(track) = self
            .queue
            .previous()
            .and_then(|i| self.queue.get(i))
            .cloned()
        {
            self.navigate_to(track, &mut actions);
        }
        actions
    }

    /// Jump to a queue index
    pub fn play_at(&mut self, index: usize) -> Result<Vec<Action>> {
        let track = self.queue.play_at(index)?.clone();
        let mut actions = Vec::new();
        self.navigate_to(track, &mut actions);
        Ok(actions)
    }

    /// Change play mode
    pub fn set_play_mode(&mut self, mode: PlayMode) -> Vec<Action> {
        if self.queue.mode() == mode {
            return Vec::new();
        }
        self.queue.set_mode(mode);
        info!(mode = ?mode, "Play mode changed");
        vec![Action::Emit(PlaybackEvent::PlayModeChanged { mode })]
    }

    /// Move a queue entry
    pub fn reorder_queue(&mut self, from: usize, to: usize) -> Result<Vec<Action>> {
        self.queue.reorder(from, to)?;
        Ok(vec![
            Action::Emit(PlaybackEvent::QueueChanged {
                length: self.queue.len(),
            }),
            Action::PersistQueue(self.queue.snapshot()),
        ])
    }

    /// Remove a queue entry
    ///
    /// Removing the current track moves playback to the track that takes its
    /// place; removing the last track stops playback.
    pub fn remove_from_queue(&mut self, index: usize) -> Result<Vec<Action>> {
        let was_current = self.queue.current_index() == Some(index);
        let removed = self.queue.remove(index)?;
        debug!(track_id = %removed.id, index, "Removed from queue");

        let mut actions = vec![Action::Emit(PlaybackEvent::QueueChanged {
            length: self.queue.len(),
        })];

        if self.queue.is_empty() {
            self.stop(&mut actions);
        } else if was_current {
            if let Some(track) = self.queue.current().cloned() {
                self.recovery.reset(&track.id);
                self.cancel_retry(&mut actions);
                self.begin_binding(track, &mut actions);
            }
        }

        actions.push(Action::PersistQueue(self.queue.snapshot()));
        Ok(actions)
    }

    /// Playlist that subsequent plays are recorded against
    pub fn set_favorite_context(&mut self, favorite_context: Option<String>) {
        self.favorite_context = favorite_context;
    }

    // ===== Playback Control =====

    /// Start or resume playback
    ///
    /// With nothing bound (after a give-up) the current track is resolved
    /// again from scratch.
    pub fn play(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(track) = self.current.clone() else {
            return actions;
        };
        self.intended_playing = true;

        if self.last_bound.is_none() {
            if self.pending.is_none() && self.pending_retry.is_none() {
                self.navigate_to(track, &mut actions);
            }
            return actions;
        }

        self.status = None;
        if !self.device_playing {
            let target = self.interval.clamp_position(self.progress);
            if target != self.progress {
                self.seek_device(target, &mut actions);
            }
            self.start_device(&mut actions);
        }
        actions
    }

    /// Pause playback
    pub fn pause(&mut self) -> Vec<Action> {
        let mut actions = Vec::new();
        self.intended_playing = false;
        if self.device_playing {
            self.device_playing = false;
            actions.push(Action::Device(DeviceCommand::Pause));
        }
        if self.last_bound.is_some() {
            self.set_state(OrchestratorState::Paused, &mut actions);
        }
        actions
    }

    /// Toggle between play and pause
    pub fn toggle_play(&mut self) -> Vec<Action> {
        if self.intended_playing {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Seek to an absolute position, clamped into the interval
    pub fn seek(&mut self, position: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        if self.last_bound.is_none() {
            return actions;
        }
        let target = self.interval.clamp_position(position);
        self.ended_latch = false;
        self.seek_device(target, &mut actions);
        actions
    }

    /// Set the user volume level
    pub fn set_volume(&mut self, level: f32) -> Vec<Action> {
        self.volume.set_level(level);
        self.volume_actions()
    }

    /// Set loudness compensation in dB
    pub fn set_volume_compensation(&mut self, db: f32) -> Vec<Action> {
        self.volume.set_compensation_db(db);
        self.volume_actions()
    }

    /// Mute or unmute
    pub fn set_muted(&mut self, muted: bool) -> Vec<Action> {
        self.volume.set_muted(muted);
        self.volume_actions()
    }

    /// Edit the current track's skip interval
    ///
    /// Bounds that fail validation are logged and re-clamped, never rejected.
    /// Every queue copy is updated and the track is persisted after a quiet
    /// period.
    pub fn set_skip_interval(&mut self, skip_start: f64, skip_end: f64) -> Vec<Action> {
        let mut actions = Vec::new();
        let Some(track) = self.current.as_mut() else {
            return actions;
        };

        if let Err(e) = validate_skip_bounds(skip_start, skip_end) {
            warn!(track_id = %track.id, error = %e, "Skip interval re-clamped");
        }
        let (skip_start, skip_end) = sanitize_skip(skip_start, skip_end);
        track.skip_start = skip_start;
        track.skip_end = skip_end;
        let track = track.clone();

        self.queue.update_track(&track);
        self.recompute_interval();

        actions.push(Action::Emit(PlaybackEvent::IntervalChanged {
            track_id: track.id.clone(),
            skip_start,
            skip_end,
        }));
        actions.push(Action::PersistTrackDebounced(track));
        actions
    }

    // ===== Device Events =====

    /// Route a device event
    pub fn handle_event(&mut self, event: DeviceEvent) -> Vec<Action> {
        let mut actions = Vec::new();

        match event {
            DeviceEvent::Play => self.on_device_play(&mut actions),
            DeviceEvent::Pause => self.on_device_pause(&mut actions),
            // Anything else refers to a source; with none bound it is a
            // leftover from a cleared one.
            _ if self.last_bound.is_none() || self.current.is_none() => {
                debug!(event = ?event, "Ignoring event with no source bound");
            }
            DeviceEvent::TimeUpdate { position } => self.on_time_update(position, &mut actions),
            DeviceEvent::LoadedMetadata { duration } => {
                self.on_loaded_metadata(duration, &mut actions);
            }
            DeviceEvent::CanPlay => self.on_can_play(&mut actions),
            DeviceEvent::Ended => {
                if !self.ended_latch {
                    self.handle_ended(&mut actions);
                }
            }
            DeviceEvent::Error(error) => self.on_device_error(error, &mut actions),
        }

        actions
    }

    fn on_device_play(&mut self, actions: &mut Vec<Action>) {
        self.device_playing = true;
        self.intended_playing = true;
        self.ended_latch = false;
        if self.last_bound.is_some() {
            self.set_state(OrchestratorState::Playing, actions);
        }
    }

    fn on_device_pause(&mut self, actions: &mut Vec<Action>) {
        if self.suppressed_pauses > 0 {
            self.suppressed_pauses -= 1;
            return;
        }
        self.device_playing = false;
        self.intended_playing = false;
        if self.state == OrchestratorState::Playing {
            self.set_state(OrchestratorState::Paused, actions);
        }
    }

    fn on_time_update(&mut self, position: f64, actions: &mut Vec<Action>) {
        // Without a duration the window is provisional; bounds would misfire
        if self.duration.is_none() {
            self.progress = position;
            return;
        }

        if self.interval.is_before_start(position) {
            self.seek_device(self.interval.start, actions);
            return;
        }

        if self.interval.is_past_end(position) {
            if self.ended_latch {
                return;
            }
            debug!(position, end = self.interval.end, "Interval end reached");
            self.progress = self.interval.end;
            actions.push(Action::Device(DeviceCommand::Seek(self.interval.start)));
            self.silent_pause(actions);
            self.handle_ended(actions);
            return;
        }

        self.progress = position;
    }

    fn on_loaded_metadata(&mut self, duration: f64, actions: &mut Vec<Action>) {
        if !duration.is_finite() || duration <= 0.0 {
            debug!(duration, "Unusable duration, keeping interval provisional");
            self.duration = None;
            self.interval = Interval::provisional();
            return;
        }
        self.duration = Some(duration);

        if let Some(track) = self.current.as_mut() {
            if track.skip_end == 0.0 {
                track.skip_end = duration;
                let track = track.clone();
                debug!(track_id = %track.id, duration, "Materialized open skip end");
                self.queue.update_track(&track);
                actions.push(Action::PersistTrack(track));
            }
        }
        self.recompute_interval();

        if self.intended_playing && !self.device_playing {
            self.kick_playback(actions);
        }
    }

    fn on_can_play(&mut self, actions: &mut Vec<Action>) {
        if let Some(track) = &self.current {
            self.recovery.on_track_loaded(&track.id);
        }

        if self.intended_playing && !self.device_playing {
            self.kick_playback(actions);
        } else if self.state == OrchestratorState::Ready {
            let state = if self.device_playing {
                OrchestratorState::Playing
            } else {
                OrchestratorState::Paused
            };
            self.set_state(state, actions);
        }
    }

    fn on_device_error(&mut self, error: DeviceError, actions: &mut Vec<Action>) {
        let Some(track) = self.current.clone() else {
            return;
        };
        let bound = self.bound_kind.unwrap_or(SourceKind::Direct);
        let action = self.recovery.handle_device_error(
            &track,
            bound,
            &error,
            self.recovery_context(),
            Utc::now(),
        );
        self.apply_recovery(&track.id, action, actions);
    }

    fn handle_ended(&mut self, actions: &mut Vec<Action>) {
        let Some(track_id) = self.current.as_ref().map(|t| t.id.clone()) else {
            return;
        };
        self.ended_latch = true;
        actions.push(Action::Emit(PlaybackEvent::TrackFinished {
            track_id: track_id.clone(),
        }));

        match self.queue.on_natural_end() {
            Some(NaturalEnd::Replay) => {
                debug!(track_id = %track_id, "Replaying track");
                self.intended_playing = true;
                let start = self.play_start();
                self.seek_device(start, actions);
                self.start_device(actions);
            }
            Some(NaturalEnd::Advance(index)) => {
                if let Some(track) = self.queue.get(index).cloned() {
                    self.navigate_to(track, actions);
                }
            }
            None => {
                self.intended_playing = false;
                self.set_state(OrchestratorState::Paused, actions);
            }
        }
    }

    // ===== Resolution & Recovery =====

    /// Accept the result of a resolution started by an [`Action::Resolve`]
    ///
    /// Results whose ticket is no longer current are discarded.
    pub fn on_resolved(
        &mut self,
        ticket: &ResolutionTicket,
        result: std::result::Result<ResolvedSource, ResolutionError>,
    ) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.is_current_ticket(self.pending.as_ref(), ticket) {
            debug!(
                track_id = %ticket.track_id,
                generation = ticket.generation,
                "Discarding stale resolution"
            );
            return actions;
        }
        self.pending = None;

        let Some(track) = self.current.as_mut() else {
            return actions;
        };

        match result {
            Ok(resolved) => {
                if resolved.apply_to(track) {
                    let track = track.clone();
                    self.queue.update_track(&track);
                    actions.push(Action::PersistTrack(track));
                }
                self.status = None;
                actions.push(Action::Emit(PlaybackEvent::SourceResolved {
                    track_id: ticket.track_id.clone(),
                    kind: resolved.kind,
                    refreshed: resolved.refreshed,
                }));
                actions.push(Action::RecordPlayback {
                    favorite_context: self.favorite_context.clone(),
                    track_id: ticket.track_id.clone(),
                });
                self.bind(&ticket.track_id, resolved, &mut actions);
            }
            Err(error) => {
                let track = track.clone();
                let action =
                    self.recovery
                        .handle_resolution_error(&track, &error, self.recovery_context());
                self.apply_recovery(&track.id, action, &mut actions);
            }
        }

        actions
    }

    /// Fire a retry scheduled by an [`Action::ScheduleRetry`]
    pub fn on_retry_due(&mut self, ticket: &ResolutionTicket) -> Vec<Action> {
        let mut actions = Vec::new();
        if !self.is_current_ticket(self.pending_retry.as_ref(), ticket) {
            debug!(track_id = %ticket.track_id, "Discarding stale retry");
            return actions;
        }
        self.pending_retry = None;
        self.recovery.on_retry_started(&ticket.track_id);

        if let Some(track) = self.current.clone() {
            info!(track_id = %track.id, "Retrying playback");
            self.intended_playing = true;
            self.begin_binding(track, &mut actions);
        }
        actions
    }

    fn apply_recovery(&mut self, track_id: &TrackId, action: RecoveryAction, actions: &mut Vec<Action>) {
        match action {
            RecoveryAction::Ignore => {}
            RecoveryAction::RetryLocalDisabled(track) => {
                self.schedule_retry(track, true, actions);
            }
            RecoveryAction::RetryRefreshed(track) => {
                self.schedule_retry(track, false, actions);
            }
            RecoveryAction::GiveUp {
                reason,
                skip_to_next,
            } => {
                self.intended_playing = false;
                self.silent_pause(actions);
                self.status = Some(reason.clone());
                actions.push(Action::Emit(PlaybackEvent::Error {
                    track_id: Some(track_id.clone()),
                    message: reason,
                    terminal: true,
                }));
                let state = if self.last_bound.is_some() {
                    OrchestratorState::Paused
                } else {
                    OrchestratorState::Idle
                };
                self.set_state(state, actions);

                if skip_to_next {
                    info!(track_id = %track_id, "Skipping past failed track");
                    actions.extend(self.next());
                }
            }
        }
    }

    fn schedule_retry(&mut self, track: Track, local_disabled: bool, actions: &mut Vec<Action>) {
        self.set_state(OrchestratorState::ErrorHandling, actions);
        self.unbind(actions);

        self.queue.update_track(&track);
        if local_disabled {
            actions.push(Action::PersistTrack(track.clone()));
        }

        let attempt = self.recovery.ledger().count(&track.id);
        let delay = self.config.retry_delay();
        self.status = Some(if local_disabled {
            "Local file unavailable, fetching stream".to_string()
        } else {
            "Play URL failed, fetching a new one".to_string()
        });

        self.generation = self.generation.wrapping_add(1);
        let ticket = ResolutionTicket {
            generation: self.generation,
            track_id: track.id.clone(),
        };
        self.pending = None;
        self.pending_retry = Some(ticket.clone());
        self.current = Some(track);

        actions.push(Action::ScheduleRetry {
            ticket: ticket.clone(),
            delay,
        });
        actions.push(Action::Emit(PlaybackEvent::RetryScheduled {
            track_id: ticket.track_id,
            attempt,
            delay_ms: delay.as_millis() as u64,
        }));
    }

    // ===== Binding =====

    fn navigate_to(&mut self, track: Track, actions: &mut Vec<Action>) {
        self.recovery.reset(&track.id);
        self.cancel_retry(actions);
        self.intended_playing = true;
        self.status = None;
        self.begin_binding(track, actions);
        actions.push(Action::PersistQueue(self.queue.snapshot()));
    }

    fn begin_binding(&mut self, track: Track, actions: &mut Vec<Action>) {
        let previous = self.current.as_ref().map(|t| t.id.clone());
        if previous.as_ref() != Some(&track.id) {
            // The device only ever holds one track
            self.unbind(actions);
            self.progress = 0.0;
            self.duration = None;
            self.interval = Interval::provisional();
            self.ended_latch = false;
            actions.push(Action::Emit(PlaybackEvent::TrackChanged {
                track_id: track.id.clone(),
                previous_track_id: previous,
            }));
        }

        self.generation = self.generation.wrapping_add(1);
        let ticket = ResolutionTicket {
            generation: self.generation,
            track_id: track.id.clone(),
        };
        debug!(track_id = %track.id, generation = self.generation, "Resolving source");

        self.current = Some(track.clone());
        self.recompute_interval();
        self.pending = Some(ticket.clone());
        actions.push(Action::Resolve { ticket, track });
        self.set_state(OrchestratorState::Binding, actions);
    }

    fn bind(&mut self, track_id: &TrackId, resolved: ResolvedSource, actions: &mut Vec<Action>) {
        let pair = (track_id.clone(), resolved.url);
        self.bound_kind = Some(resolved.kind);

        if self.last_bound.as_ref() == Some(&pair) {
            debug!(track_id = %track_id, "Source already bound");
            if self.intended_playing && !self.device_playing {
                self.kick_playback(actions);
            } else {
                let state = if self.device_playing {
                    OrchestratorState::Playing
                } else {
                    OrchestratorState::Paused
                };
                self.set_state(state, actions);
            }
            return;
        }

        info!(track_id = %track_id, url = %pair.1, kind = ?resolved.kind, "Binding source");
        self.silent_pause(actions);
        actions.push(Action::Device(DeviceCommand::SetSource(pair.1.clone())));
        actions.push(Action::Device(DeviceCommand::Load));

        self.last_bound = Some(pair);
        self.progress = 0.0;
        self.duration = None;
        self.interval = Interval::provisional();
        self.ended_latch = false;
        self.set_state(OrchestratorState::Ready, actions);
    }

    fn unbind(&mut self, actions: &mut Vec<Action>) {
        self.silent_pause(actions);
        if self.last_bound.take().is_some() {
            actions.push(Action::Device(DeviceCommand::ClearSource));
        }
        self.bound_kind = None;
    }

    fn stop(&mut self, actions: &mut Vec<Action>) {
        self.cancel_retry(actions);
        self.pending = None;
        self.unbind(actions);
        self.current = None;
        self.intended_playing = false;
        self.progress = 0.0;
        self.duration = None;
        self.interval = Interval::provisional();
        self.ended_latch = false;
        self.set_state(OrchestratorState::Idle, actions);
    }

    // ===== Helpers =====

    fn kick_playback(&mut self, actions: &mut Vec<Action>) {
        let start = self.play_start();
        if self.progress < start || self.ended_latch {
            self.seek_device(start, actions);
        }
        self.start_device(actions);
    }

    fn start_device(&mut self, actions: &mut Vec<Action>) {
        self.device_playing = true;
        actions.push(Action::Device(DeviceCommand::Play));
        self.set_state(OrchestratorState::Playing, actions);
    }

    fn seek_device(&mut self, position: f64, actions: &mut Vec<Action>) {
        self.progress = position;
        actions.push(Action::Device(DeviceCommand::Seek(position)));
    }

    fn silent_pause(&mut self, actions: &mut Vec<Action>) {
        if self.device_playing {
            self.device_playing = false;
            self.suppressed_pauses += 1;
            actions.push(Action::Device(DeviceCommand::Pause));
        }
    }

    fn cancel_retry(&mut self, actions: &mut Vec<Action>) {
        if self.pending_retry.take().is_some() {
            actions.push(Action::CancelRetry);
        }
    }

    fn volume_actions(&self) -> Vec<Action> {
        vec![
            Action::Device(DeviceCommand::SetVolume(self.volume.effective())),
            Action::Emit(PlaybackEvent::VolumeChanged {
                level: self.volume.level(),
                muted: self.volume.is_muted(),
                effective: self.volume.effective(),
            }),
        ]
    }

    fn set_state(&mut self, state: OrchestratorState, actions: &mut Vec<Action>) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "State changed");
            self.state = state;
            actions.push(Action::Emit(PlaybackEvent::StateChanged { state }));
        }
    }

    // Interval start, or the raw skip start while the duration is unknown
    fn play_start(&self) -> f64 {
        if !self.interval.is_provisional() {
            return self.interval.start;
        }
        self.current
            .as_ref()
            .map(|t| t.skip_start)
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(0.0)
    }

    fn recompute_interval(&mut self) {
        self.interval = match (self.duration, self.current.as_ref()) {
            (Some(duration), Some(track)) => {
                Interval::clamp(track.skip_start, track.skip_end, duration)
            }
            _ => Interval::provisional(),
        };
    }

    fn recovery_context(&self) -> RecoveryContext {
        RecoveryContext {
            play_mode: self.queue.mode(),
            queue_len: self.queue.len(),
        }
    }

    fn is_current_ticket(&self, expected: Option<&ResolutionTicket>, ticket: &ResolutionTicket) -> bool {
        expected == Some(ticket)
            && self
                .current
                .as_ref()
                .is_some_and(|track| track.id == ticket.track_id)
    }
}

fn sanitize_skip(skip_start: f64, skip_end: f64) -> (f64, f64) {
    let start = if skip_start.is_finite() {
        skip_start.max(0.0)
    } else {
        0.0
    };
    let end = if skip_end.is_finite() {
        skip_end.max(0.0)
    } else {
        0.0
    };
    if end != 0.0 && end < start {
        (start, start)
    } else {
        (start, end)
    }
}
