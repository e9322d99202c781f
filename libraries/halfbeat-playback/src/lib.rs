//! Halfbeat - Playback Engine
//!
//! Client-side playback of streamed tracks with per-track skip intervals.
//!
//! This crate provides:
//! - Interval clamping (play only `[skip_start, skip_end]` of a track)
//! - Source resolution (local cache → cached proxy URL → refreshed URL)
//! - Bounded error recovery (retry with local disabled or a fresh URL)
//! - Play queue with Sequential, Shuffle and SingleRepeat modes
//! - Volume with loudness compensation and mute
//! - An async session that serializes commands, device events and timers
//!
//! # Architecture
//!
//! The engine is split into a synchronous state machine and an async driver:
//! - [`PlaybackOrchestrator`] takes one input at a time and returns the side
//!   effects as [`Action`]s
//! - [`PlaybackSession`] executes those actions (device commands, resolution
//!   tasks, retry timers, persistence) and publishes a [`PlayerSnapshot`]
//!
//! Backends are reached only through the `halfbeat-core` traits and the
//! [`AudioDevice`] trait, so the engine runs the same against an HTTP backend
//! or in-process fakes.
//!
//! # Example: Driving the State Machine
//!
//! ```rust
//! use halfbeat_core::Track;
//! use halfbeat_playback::{Action, PlaybackConfig, PlaybackOrchestrator};
//!
//! let mut orchestrator = PlaybackOrchestrator::new(PlaybackConfig::default());
//! let actions = orchestrator.select_track(Track::new("song-1", "Opening Theme"), None);
//!
//! // The session resolves the source and reports back via `on_resolved`
//! assert!(actions.iter().any(|a| matches!(a, Action::Resolve { .. })));
//! assert!(orchestrator.is_playing());
//! ```
//!
//! # Example: Interval Clamping
//!
//! ```rust
//! use halfbeat_playback::Interval;
//!
//! let interval = Interval::clamp(30.0, 0.0, 240.0);
//! assert_eq!(interval.start, 30.0);
//! assert_eq!(interval.end, 240.0);
//! assert_eq!(interval.clamp_position(10.0), 30.0);
//! ```

pub mod device;
mod error;
pub mod events;
mod interval;
pub mod orchestrator;
mod queue;
pub mod recovery;
pub mod resolver;
pub mod session;
mod shuffle;
mod source;
pub mod types;
mod volume;

// Public exports
pub use device::{AudioDevice, DeviceCommand, DeviceErrorCode, DeviceEvent};
pub use error::{
    DeviceError, PlaybackError, ResolutionCause, ResolutionError, Result, ValidationError,
};
pub use events::PlaybackEvent;
pub use interval::{validate_skip_bounds, Interval};
pub use orchestrator::{Action, PlaybackOrchestrator, ResolutionTicket};
pub use queue::{NaturalEnd, QueueManager};
pub use recovery::{ErrorRecovery, RecoveryAction, RecoveryContext, RetryLedger};
pub use resolver::{ResolvedSource, SourceResolver};
pub use session::{DeviceEventSender, PlaybackSession, SessionCommand, SessionHandle};
pub use shuffle::IndexPicker;
pub use source::{SourceKind, SourceOrigin};
pub use types::{OrchestratorState, PlayMode, PlaybackConfig, PlayerSnapshot};
pub use volume::Volume;
