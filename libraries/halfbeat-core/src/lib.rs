//! Halfbeat Core
//!
//! Shared domain types and backend contracts for the Halfbeat playback engine.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `PlayUrl`, `QueueSnapshot`
//! - **Backend Contracts**: `PlayUrlIssuer`, `LocalCacheIndex`, `LivenessProbe`,
//!   `PersistenceSink`
//! - **Error Handling**: `UpstreamError` and its `Result` alias
//!
//! The playback engine only talks to the outside world through these traits,
//! so the transport (HTTP, IPC, an in-process fake) is chosen by the caller.
//!
//! # Example
//!
//! ```rust
//! use halfbeat_core::{Track, TrackId};
//!
//! let track = Track::new("song-1", "Opening Theme")
//!     .with_external_ref("BV1xx411c7mD")
//!     .with_skip(12.5, 0.0);
//!
//! assert_eq!(track.id, TrackId::new("song-1"));
//! assert!(track.has_external_ref());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{Result, UpstreamError};
pub use traits::{LivenessProbe, LocalCacheIndex, PersistenceSink, PlayUrlIssuer};
pub use types::{PlayUrl, QueueSnapshot, Track, TrackId};
