//! Async playback session
//!
//! Runs the orchestrator on a single logical timeline. Commands from the UI,
//! device events, resolution results and timer expiries are processed one at
//! a time; after each the new [`PlayerSnapshot`] is published on a watch
//! channel. Network work (resolution, persistence) runs in spawned tasks and
//! is never cancelled; only its results are ignored when stale.

use crate::{
    device::{AudioDevice, DeviceEvent},
    error::{PlaybackError, ResolutionError, Result},
    events::PlaybackEvent,
    orchestrator::{Action, PlaybackOrchestrator, ResolutionTicket},
    resolver::{ResolvedSource, SourceResolver},
    types::{PlayMode, PlaybackConfig, PlayerSnapshot},
};
use halfbeat_core::{PersistenceSink, QueueSnapshot, Track, TrackId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 64;

/// Command sent from a [`SessionHandle`] to the run loop
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Play,
    Pause,
    TogglePlay,
    Seek(f64),
    SetVolume(f32),
    SetVolumeCompensation(f32),
    SetMuted(bool),
    SelectTrack {
        track: Track,
        queue: Option<Vec<Track>>,
    },
    Next,
    Previous,
    PlayAt(usize),
    SetPlayMode(PlayMode),
    SetSkipInterval {
        start: f64,
        end: f64,
    },
    ReorderQueue {
        from: usize,
        to: usize,
    },
    RemoveFromQueue(usize),
    SetFavoriteContext(Option<String>),
    Shutdown,
}

/// Channel the device reports its events through
#[derive(Debug, Clone)]
pub struct DeviceEventSender {
    tx: mpsc::UnboundedSender<DeviceEvent>,
}

impl DeviceEventSender {
    /// Report a device event
    pub fn send(&self, event: DeviceEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| PlaybackError::SessionClosed)
    }
}

/// Cloneable control surface of a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    device_events: DeviceEventSender,
    state: watch::Receiver<PlayerSnapshot>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl SessionHandle {
    fn send(&self, command: SessionCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn play(&self) -> Result<()> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause)
    }

    pub fn toggle_play(&self) -> Result<()> {
        self.send(SessionCommand::TogglePlay)
    }

    /// Seek to an absolute position in seconds (clamped into the interval)
    pub fn seek(&self, position: f64) -> Result<()> {
        self.send(SessionCommand::Seek(position))
    }

    pub fn set_volume(&self, level: f32) -> Result<()> {
        self.send(SessionCommand::SetVolume(level))
    }

    pub fn set_volume_compensation(&self, db: f32) -> Result<()> {
        self.send(SessionCommand::SetVolumeCompensation(db))
    }

    pub fn set_muted(&self, muted: bool) -> Result<()> {
        self.send(SessionCommand::SetMuted(muted))
    }

    /// Play `track`, optionally replacing the queue
    pub fn select_track(&self, track: Track, queue: Option<Vec<Track>>) -> Result<()> {
        self.send(SessionCommand::SelectTrack { track, queue })
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Result<()> {
        self.send(SessionCommand::Next)
    }

    pub fn previous(&self) -> Result<()> {
        self.send(SessionCommand::Previous)
    }

    pub fn play_at(&self, index: usize) -> Result<()> {
        self.send(SessionCommand::PlayAt(index))
    }

    pub fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        self.send(SessionCommand::SetPlayMode(mode))
    }

    /// Edit the current track's skip interval (`end == 0` = end of media)
    pub fn set_skip_interval(&self, start: f64, end: f64) -> Result<()> {
        self.send(SessionCommand::SetSkipInterval { start, end })
    }

    pub fn reorder_queue(&self, from: usize, to: usize) -> Result<()> {
        self.send(SessionCommand::ReorderQueue { from, to })
    }

    pub fn remove_from_queue(&self, index: usize) -> Result<()> {
        self.send(SessionCommand::RemoveFromQueue(index))
    }

    pub fn set_favorite_context(&self, favorite_context: Option<String>) -> Result<()> {
        self.send(SessionCommand::SetFavoriteContext(favorite_context))
    }

    /// Stop the run loop after flushing pending persistence
    pub fn shutdown(&self) -> Result<()> {
        self.send(SessionCommand::Shutdown)
    }

    /// Sender for the device to report events through
    pub fn device_events(&self) -> DeviceEventSender {
        self.device_events.clone()
    }

    /// Watch receiver for the published state
    pub fn state(&self) -> watch::Receiver<PlayerSnapshot> {
        self.state.clone()
    }

    /// Latest published state
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.state.borrow().clone()
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }
}

struct Resolution {
    ticket: ResolutionTicket,
    result: std::result::Result<ResolvedSource, ResolutionError>,
}

/// Run loop driving a [`PlaybackOrchestrator`] against a device
pub struct PlaybackSession<D> {
    orchestrator: PlaybackOrchestrator,
    resolver: Arc<SourceResolver>,
    sink: Arc<dyn PersistenceSink>,
    device: D,
    config: PlaybackConfig,

    commands: mpsc::UnboundedReceiver<SessionCommand>,
    device_events: mpsc::UnboundedReceiver<DeviceEvent>,
    resolutions_tx: mpsc::UnboundedSender<Resolution>,
    resolutions_rx: mpsc::UnboundedReceiver<Resolution>,

    retry: Option<(ResolutionTicket, Instant)>,
    queue_persist: Option<(QueueSnapshot, Instant)>,
    track_persists: HashMap<TrackId, (Track, Instant)>,

    state_tx: watch::Sender<PlayerSnapshot>,
    events_tx: broadcast::Sender<PlaybackEvent>,
}

impl<D: AudioDevice> PlaybackSession<D> {
    /// Create a session and the handle controlling it
    pub fn new(
        config: PlaybackConfig,
        resolver: SourceResolver,
        sink: Arc<dyn PersistenceSink>,
        device: D,
    ) -> (Self, SessionHandle) {
        let orchestrator = PlaybackOrchestrator::new(config.clone());
        Self::with_orchestrator(orchestrator, config, resolver, sink, device)
    }

    /// Create a session around a prepared orchestrator (restored queue, seeded shuffle)
    pub fn with_orchestrator(
        orchestrator: PlaybackOrchestrator,
        config: PlaybackConfig,
        resolver: SourceResolver,
        sink: Arc<dyn PersistenceSink>,
        device: D,
    ) -> (Self, SessionHandle) {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (device_tx, device_events) = mpsc::unbounded_channel();
        let (resolutions_tx, resolutions_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(orchestrator.snapshot());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let handle = SessionHandle {
            commands: commands_tx,
            device_events: DeviceEventSender { tx: device_tx },
            state: state_rx,
            events: events_tx.clone(),
        };

        let session = Self {
            orchestrator,
            resolver: Arc::new(resolver),
            sink,
            device,
            config,
            commands,
            device_events,
            resolutions_tx,
            resolutions_rx,
            retry: None,
            queue_persist: None,
            track_persists: HashMap::new(),
            state_tx,
            events_tx,
        };

        (session, handle)
    }

    /// Process inputs until shutdown or until every handle is dropped
    pub async fn run(mut self) {
        info!("Playback session started");
        let initial = self.orchestrator.initial_actions();
        self.execute(initial);
        self.publish();

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(SessionCommand::Shutdown) | None => break,
                        Some(command) => {
                            let actions = self.dispatch(command);
                            self.execute(actions);
                        }
                    }
                }

                Some(event) = self.device_events.recv() => {
                    let actions = self.orchestrator.handle_event(event);
                    self.execute(actions);
                }

                Some(resolution) = self.resolutions_rx.recv() => {
                    let actions = self
                        .orchestrator
                        .on_resolved(&resolution.ticket, resolution.result);
                    self.execute(actions);
                }

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.fire_timers(Instant::now());
                }
            }

            self.publish();
        }

        self.flush_persistence().await;
        info!("Playback session stopped");
    }

    fn dispatch(&mut self, command: SessionCommand) -> Vec<Action> {
        debug!(command = ?command, "Session command");
        let o = &mut self.orchestrator;
        let result = match command {
            SessionCommand::Play => Ok(o.play()),
            SessionCommand::Pause => Ok(o.pause()),
            SessionCommand::TogglePlay => Ok(o.toggle_play()),
            SessionCommand::Seek(position) => Ok(o.seek(position)),
            SessionCommand::SetVolume(level) => Ok(o.set_volume(level)),
            SessionCommand::SetVolumeCompensation(db) => Ok(o.set_volume_compensation(db)),
            SessionCommand::SetMuted(muted) => Ok(o.set_muted(muted)),
            SessionCommand::SelectTrack { track, queue } => Ok(o.select_track(track, queue)),
            SessionCommand::Next => Ok(o.next()),
            SessionCommand::Previous => Ok(o.previous()),
            SessionCommand::PlayAt(index) => o.play_at(index),
            SessionCommand::SetPlayMode(mode) => Ok(o.set_play_mode(mode)),
            SessionCommand::SetSkipInterval { start, end } => Ok(o.set_skip_interval(start, end)),
            SessionCommand::ReorderQueue { from, to } => o.reorder_queue(from, to),
            SessionCommand::RemoveFromQueue(index) => o.remove_from_queue(index),
            SessionCommand::SetFavoriteContext(favorite_context) => {
                o.set_favorite_context(favorite_context);
                Ok(Vec::new())
            }
            // Handled by the run loop
            SessionCommand::Shutdown => Ok(Vec::new()),
        };

        result.unwrap_or_else(|e| {
            warn!(error = %e, "Command rejected");
            vec![Action::Emit(PlaybackEvent::Error {
                track_id: None,
                message: e.to_string(),
                terminal: false,
            })]
        })
    }

    fn execute(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Device(command) => {
                    if let Err(e) = self.device.apply(&command) {
                        warn!(command = ?command, error = %e, "Device command failed");
                    }
                }
                Action::Resolve { ticket, track } => self.spawn_resolution(ticket, track),
                Action::ScheduleRetry { ticket, delay } => {
                    debug!(track_id = %ticket.track_id, delay_ms = delay.as_millis() as u64, "Retry scheduled");
                    self.retry = Some((ticket, Instant::now() + delay));
                }
                Action::CancelRetry => {
                    self.retry = None;
                }
                Action::PersistTrack(track) => {
                    self.track_persists.remove(&track.id);
                    self.spawn_persist_track(track);
                }
                Action::PersistTrackDebounced(track) => {
                    let deadline = Instant::now() + self.config.track_persist_debounce();
                    self.track_persists
                        .insert(track.id.clone(), (track, deadline));
                }
                Action::PersistQueue(snapshot) => {
                    let deadline = Instant::now() + self.config.queue_persist_debounce();
                    self.queue_persist = Some((snapshot, deadline));
                }
                Action::RecordPlayback {
                    favorite_context,
                    track_id,
                } => self.spawn_record_playback(favorite_context, track_id),
                Action::Emit(event) => {
                    // No subscribers is fine
                    let _ = self.events_tx.send(event);
                }
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let retry = self.retry.as_ref().map(|(_, at)| *at);
        let queue = self.queue_persist.as_ref().map(|(_, at)| *at);
        let tracks = self.track_persists.values().map(|(_, at)| *at).min();
        [retry, queue, tracks].into_iter().flatten().min()
    }

    fn fire_timers(&mut self, now: Instant) {
        if let Some((snapshot, _)) = self.queue_persist.take_if_due(now) {
            self.spawn_persist_queue(snapshot);
        }

        let due: Vec<TrackId> = self
            .track_persists
            .iter()
            .filter(|(_, (_, at))| *at <= now)
            .map(|(id, _)| id.clone())
            .collect();
        for id in due {
            if let Some((track, _)) = self.track_persists.remove(&id) {
                self.spawn_persist_track(track);
            }
        }

        if let Some((ticket, _)) = self.retry.take_if_due(now) {
            let actions = self.orchestrator.on_retry_due(&ticket);
            self.execute(actions);
        }
    }

    fn spawn_resolution(&self, ticket: ResolutionTicket, track: Track) {
        let resolver = Arc::clone(&self.resolver);
        let tx = self.resolutions_tx.clone();
        tokio::spawn(async move {
            let result = resolver.resolve(&track).await;
            // The session may have stopped; the result is simply dropped
            let _ = tx.send(Resolution { ticket, result });
        });
    }

    fn spawn_persist_track(&self, track: Track) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.persist_track(&track).await {
                warn!(track_id = %track.id, error = %e, "Failed to persist track");
            }
        });
    }

    fn spawn_persist_queue(&self, snapshot: QueueSnapshot) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink.persist_queue_state(&snapshot).await {
                warn!(error = %e, "Failed to persist queue state");
            }
        });
    }

    fn spawn_record_playback(&self, favorite_context: Option<String>, track_id: TrackId) {
        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            if let Err(e) = sink
                .record_playback_event(favorite_context.as_deref(), &track_id)
                .await
            {
                warn!(track_id = %track_id, error = %e, "Failed to record playback");
            }
        });
    }

    async fn flush_persistence(&mut self) {
        if let Some((snapshot, _)) = self.queue_persist.take() {
            if let Err(e) = self.sink.persist_queue_state(&snapshot).await {
                warn!(error = %e, "Failed to persist queue state on shutdown");
            }
        }
        for (_, (track, _)) in self.track_persists.drain() {
            if let Err(e) = self.sink.persist_track(&track).await {
                warn!(track_id = %track.id, error = %e, "Failed to persist track on shutdown");
            }
        }
    }

    fn publish(&self) {
        self.state_tx.send_replace(self.orchestrator.snapshot());
    }
}

impl<D: AudioDevice + 'static> PlaybackSession<D> {
    /// Run the session on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}

trait TakeIfDue<T> {
    fn take_if_due(&mut self, now: Instant) -> Option<(T, Instant)>;
}

impl<T> TakeIfDue<T> for Option<(T, Instant)> {
    fn take_if_due(&mut self, now: Instant) -> Option<(T, Instant)> {
        match self {
            Some((_, at)) if *at <= now => self.take(),
            _ => None,
        }
    }
}
