//! Main Halfbeat backend client.

use crate::error::{ClientError, Result};
use crate::types::{
    ClientConfig, HistoryRequest, LocalCacheResponse, PlayUrlResponse, QueueStateRequest,
    TrackUpdateRequest,
};
use async_trait::async_trait;
use halfbeat_core::{
    LivenessProbe, LocalCacheIndex, PersistenceSink, PlayUrl, PlayUrlIssuer, QueueSnapshot,
    Track, TrackId,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// Client for the Halfbeat backend.
///
/// Implements every backend contract the playback engine consumes, so one
/// instance (behind an `Arc`) can serve as issuer, cache index, probe and
/// persistence sink.
///
/// # Example
///
/// ```ignore
/// use halfbeat_client::{ClientConfig, HalfbeatClient};
///
/// let client = HalfbeatClient::new(ClientConfig::new("http://127.0.0.1:9999"))?;
/// let play_url = client.get_play_url("BV1xx411c7mD", 1).await?;
/// println!("{} (expires {})", play_url.proxy_url, play_url.expires_at);
/// ```
#[derive(Clone)]
pub struct HalfbeatClient {
    http: Client,
    base_url: Url,
    access_token: Arc<RwLock<Option<String>>>,
}

impl HalfbeatClient {
    /// Create a new client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(ClientError::InvalidUrl("URL cannot be empty".into()));
        }

        let trimmed = config.base_url.trim_end_matches('/');
        if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
            return Err(ClientError::InvalidUrl(
                "URL must start with http:// or https://".into(),
            ));
        }
        let base_url =
            Url::parse(trimmed).map_err(|e| ClientError::InvalidUrl(format!("{trimmed}: {e}")))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(format!("Halfbeat/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Request)?;

        Ok(Self {
            http,
            base_url,
            access_token: Arc::new(RwLock::new(config.access_token)),
        })
    }

    /// Base URL of the backend, without trailing slash.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Replace the bearer token.
    pub async fn set_access_token(&self, token: Option<String>) {
        *self.access_token.write().await = token;
    }

    // ===== Play URLs =====

    /// Issue a fresh proxy URL for an external source reference.
    ///
    /// Page 0 is sent as page 1.
    pub async fn get_play_url(&self, external_ref: &str, page: u32) -> Result<PlayUrl> {
        if external_ref.is_empty() {
            return Err(ClientError::InvalidRequest(
                "external reference cannot be empty".into(),
            ));
        }

        let mut url = self.endpoint(&["api", "play-url"])?;
        url.query_pairs_mut()
            .append_pair("ref", external_ref)
            .append_pair("page", &page.max(1).to_string());
        debug!(url = %url, "Requesting play URL");

        let response = self.send(self.http.get(url)).await?;
        let response = check_status(response).await?;
        let body: PlayUrlResponse = response.json().await.map_err(|e| {
            ClientError::ParseError(format!("Failed to parse play URL response: {e}"))
        })?;

        info!(external_ref = %external_ref, expires_at = %body.expires_at, "Play URL issued");
        Ok(body.into())
    }

    /// Local URL of a downloaded copy, if the backend has one.
    pub async fn get_local_url(&self, track_id: &TrackId) -> Result<Option<String>> {
        let url = self.endpoint(&["api", "local-cache", track_id.as_str()])?;
        debug!(url = %url, "Looking up local copy");

        let response = self.send(self.http.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response).await?;
        let body: LocalCacheResponse = response.json().await.map_err(|e| {
            ClientError::ParseError(format!("Failed to parse local cache response: {e}"))
        })?;

        Ok(body.url.filter(|u| !u.is_empty()))
    }

    /// Whether `url` answers a HEAD request with a success status.
    pub async fn head_ok(&self, url: &str) -> bool {
        match self.http.head(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(url = %url, error = %e, "HEAD probe failed");
                false
            }
        }
    }

    // ===== Persistence =====

    /// Write a track's playback metadata.
    pub async fn update_track(&self, track: &Track) -> Result<()> {
        let url = self.endpoint(&["api", "tracks", track.id.as_str()])?;
        let body = TrackUpdateRequest::from(track);
        debug!(track_id = %track.id, "Persisting track");

        let response = self.send(self.http.put(url).json(&body)).await?;
        check_status(response).await?;
        Ok(())
    }

    /// Save queue order and position.
    pub async fn save_queue(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let url = self.endpoint(&["api", "queue"])?;
        let body = QueueStateRequest::from(snapshot);
        debug!(length = body.track_ids.len(), current = body.current_index, "Persisting queue");

        let response = self.send(self.http.put(url).json(&body)).await?;
        check_status(response).await?;
        Ok(())
    }

    /// Append a play-history entry.
    pub async fn record_history(
        &self,
        favorite_context: Option<&str>,
        track_id: &TrackId,
    ) -> Result<()> {
        let url = self.endpoint(&["api", "history"])?;
        let body = HistoryRequest {
            favorite_id: favorite_context.map(str::to_string),
            track_id: track_id.clone(),
        };

        let response = self.send(self.http.post(url).json(&body)).await?;
        check_status(response).await?;
        Ok(())
    }

    // ===== Helpers =====

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.access_token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(ClientError::from_transport)
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::AuthRequired);
    }

    let message = response.text().await.unwrap_or_default();
    warn!(status = status.as_u16(), message = %message, "Backend returned error");
    Err(ClientError::ServerError {
        status: status.as_u16(),
        message,
    })
}

// ===== Backend Contracts =====

#[async_trait]
impl PlayUrlIssuer for HalfbeatClient {
    async fn issue_play_url(&self, external_ref: &str, page: u32) -> halfbeat_core::Result<PlayUrl> {
        Ok(self.get_play_url(external_ref, page).await?)
    }
}

#[async_trait]
impl LocalCacheIndex for HalfbeatClient {
    async fn local_url(&self, track_id: &TrackId) -> halfbeat_core::Result<Option<String>> {
        Ok(self.get_local_url(track_id).await?)
    }
}

#[async_trait]
impl LivenessProbe for HalfbeatClient {
    async fn probe(&self, url: &str) -> bool {
        self.head_ok(url).await
    }
}

#[async_trait]
impl PersistenceSink for HalfbeatClient {
    async fn persist_track(&self, track: &Track) -> halfbeat_core::Result<()> {
        Ok(self.update_track(track).await?)
    }

    async fn persist_queue_state(&self, snapshot: &QueueSnapshot) -> halfbeat_core::Result<()> {
        Ok(self.save_queue(snapshot).await?)
    }

    async fn record_playback_event(
        &self,
        favorite_context: Option<&str>,
        track_id: &TrackId,
    ) -> halfbeat_core::Result<()> {
        Ok(self.record_history(favorite_context, track_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_validation() {
        assert!(HalfbeatClient::new(ClientConfig::new("https://example.com")).is_ok());
        assert!(HalfbeatClient::new(ClientConfig::new("http://localhost:9999")).is_ok());

        assert!(HalfbeatClient::new(ClientConfig::new("")).is_err());
        assert!(HalfbeatClient::new(ClientConfig::new("not-a-url")).is_err());
        assert!(HalfbeatClient::new(ClientConfig::new("ftp://example.com")).is_err());
    }

    #[test]
    fn test_url_normalization() {
        let client = HalfbeatClient::new(ClientConfig::new("https://example.com///")).unwrap();
        assert_eq!(client.base_url(), "https://example.com");
    }

    #[test]
    fn endpoints_escape_segments() {
        let client = HalfbeatClient::new(ClientConfig::new("http://localhost:9999/base/")).unwrap();
        let url = client
            .endpoint(&["api", "local-cache", "a b/c"])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:9999/base/api/local-cache/a%20b%2Fc");
    }
}
