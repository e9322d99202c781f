//! Domain types shared by the playback engine and its backends
mod ids;
mod play_url;
mod queue;
mod track;

pub use ids::TrackId;
pub use play_url::PlayUrl;
pub use queue::QueueSnapshot;
pub use track::Track;
