//! Halfbeat Backend Client
//!
//! HTTP client for the Halfbeat backend, implementing the collaborator
//! traits of `halfbeat-core`.
//!
//! # Features
//!
//! - **Play URLs**: issue time-limited proxy URLs (`GET /api/play-url`)
//! - **Local cache**: look up downloaded copies (`GET /api/local-cache/{id}`)
//! - **Liveness**: `HEAD` probe of candidate URLs
//! - **Persistence**: track metadata, queue state and play history
//!
//! # Example
//!
//! ```ignore
//! use halfbeat_client::{ClientConfig, HalfbeatClient};
//! use halfbeat_playback::{PlaybackConfig, SourceResolver};
//! use std::sync::Arc;
//!
//! let client = Arc::new(HalfbeatClient::new(ClientConfig::new("http://127.0.0.1:9999"))?);
//! let resolver = SourceResolver::new(
//!     client.clone(),
//!     client.clone(),
//!     client.clone(),
//!     &PlaybackConfig::default(),
//! )?;
//! ```

mod client;
mod error;
mod types;

pub use client::HalfbeatClient;
pub use error::{ClientError, Result};
pub use types::{
    ClientConfig, HistoryRequest, LocalCacheResponse, PlayUrlResponse, QueueStateRequest,
    TrackUpdateRequest,
};
