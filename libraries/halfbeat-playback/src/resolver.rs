//! Source resolution
//!
//! Picks the URL the device should play for a track:
//!
//! 1. A downloaded local copy, if it answers a liveness probe in time
//! 2. The cached proxy URL, if it outlives the safety margin
//! 3. A freshly issued proxy URL
//! 4. A direct URL on tracks that cannot be refreshed
//!
//! The resolver never retries; the caller decides what a failure means.

use crate::error::{ResolutionCause, ResolutionError, Result};
use crate::source::{SourceKind, SourceOrigin};
use crate::types::PlaybackConfig;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use halfbeat_core::{LivenessProbe, LocalCacheIndex, PlayUrlIssuer, Track};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Query parameter carrying the track id on issued proxy URLs
const TRACK_ID_PARAM: &str = "sid";

/// A URL ready to bind to the device
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSource {
    /// URL to bind
    pub url: String,

    /// When the URL stops working, if known
    pub expires_at: Option<DateTime<Utc>>,

    /// Where the URL comes from
    pub kind: SourceKind,

    /// Whether the URL was freshly issued (and should be persisted)
    pub refreshed: bool,
}

impl ResolvedSource {
    /// Copy a freshly issued URL onto the track
    ///
    /// Local and reused URLs leave the track untouched: local URLs are never
    /// persisted as the track's canonical stream. A fresh URL also lifts
    /// `skip_local`, so the local copy is tried again on the next selection.
    pub fn apply_to(&self, track: &mut Track) -> bool {
        if !self.refreshed {
            return false;
        }
        track.stream_url = Some(self.url.clone());
        track.stream_url_expires_at = self.expires_at;
        track.skip_local = false;
        true
    }
}

/// Resolves tracks to playable URLs
pub struct SourceResolver {
    issuer: Arc<dyn PlayUrlIssuer>,
    local_index: Arc<dyn LocalCacheIndex>,
    probe: Arc<dyn LivenessProbe>,
    origin: SourceOrigin,
    expiry_margin: ChronoDuration,
    probe_timeout: Duration,
    local_lifetime: ChronoDuration,
}

impl SourceResolver {
    /// Create a resolver
    ///
    /// Fails when `config.proxy_origin` is not a valid origin.
    pub fn new(
        issuer: Arc<dyn PlayUrlIssuer>,
        local_index: Arc<dyn LocalCacheIndex>,
        probe: Arc<dyn LivenessProbe>,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        Ok(Self {
            issuer,
            local_index,
            probe,
            origin: SourceOrigin::parse(&config.proxy_origin)?,
            expiry_margin: ChronoDuration::seconds(config.expiry_margin_secs),
            probe_timeout: config.local_probe_timeout(),
            local_lifetime: ChronoDuration::days(config.local_expiry_days),
        })
    }

    /// Origin used to classify URLs
    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    /// Resolve against the current time
    pub async fn resolve(&self, track: &Track) -> std::result::Result<ResolvedSource, ResolutionError> {
        self.resolve_at(track, Utc::now()).await
    }

    /// Resolve as if the current time were `now`
    pub async fn resolve_at(
        &self,
        track: &Track,
        now: DateTime<Utc>,
    ) -> std::result::Result<ResolvedSource, ResolutionError> {
        if !track.skip_local {
            if let Some(local) = self.try_local(track, now).await {
                return Ok(local);
            }
        }

        if let Some(cached) = self.cached_proxy(track, now) {
            debug!(track_id = %track.id, "Reusing cached proxy URL");
            return Ok(cached);
        }

        if let Some(external_ref) = track.external_ref.as_deref().filter(|r| !r.is_empty()) {
            return self.refresh(track, external_ref).await;
        }

        match track.stream_url() {
            Some(url) if self.origin.classify(url) != SourceKind::Local => {
                debug!(track_id = %track.id, url = %url, "Playing stream URL as-is");
                Ok(ResolvedSource {
                    url: url.to_string(),
                    expires_at: track.stream_url_expires_at,
                    kind: self.origin.classify(url),
                    refreshed: false,
                })
            }
            _ => Err(ResolutionError::new(
                track.id.clone(),
                ResolutionCause::NoSource,
            )),
        }
    }

    async fn try_local(&self, track: &Track, now: DateTime<Utc>) -> Option<ResolvedSource> {
        let url = match self.local_index.local_url(&track.id).await {
            Ok(Some(url)) if !url.is_empty() => url,
            Ok(_) => return None,
            Err(e) => {
                warn!(track_id = %track.id, error = %e, "Local cache lookup failed");
                return None;
            }
        };

        match tokio::time::timeout(self.probe_timeout, self.probe.probe(&url)).await {
            Ok(true) => {
                info!(track_id = %track.id, url = %url, "Using local cached copy");
                Some(ResolvedSource {
                    url,
                    expires_at: Some(now + self.local_lifetime),
                    kind: SourceKind::Local,
                    refreshed: false,
                })
            }
            Ok(false) => {
                debug!(track_id = %track.id, "Local copy did not answer probe");
                None
            }
            Err(_) => {
                warn!(
                    track_id = %track.id,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "Local copy probe timed out"
                );
                None
            }
        }
    }

    fn cached_proxy(&self, track: &Track, now: DateTime<Utc>) -> Option<ResolvedSource> {
        let url = track.stream_url()?;
        if !self.origin.is_proxy(url) {
            return None;
        }
        let fresh = track
            .stream_url_expires_at
            .map_or(true, |expires_at| expires_at > now + self.expiry_margin);
        fresh.then(|| ResolvedSource {
            url: url.to_string(),
            expires_at: track.stream_url_expires_at,
            kind: SourceKind::Proxy,
            refreshed: false,
        })
    }

    async fn refresh(
        &self,
        track: &Track,
        external_ref: &str,
    ) -> std::result::Result<ResolvedSource, ResolutionError> {
        info!(track_id = %track.id, external_ref = %external_ref, "Requesting fresh play URL");

        let issued = self
            .issuer
            .issue_play_url(external_ref, track.page)
            .await
            .map_err(|e| ResolutionError::new(track.id.clone(), e))?;

        if issued.proxy_url.is_empty() {
            return Err(ResolutionError::new(
                track.id.clone(),
                ResolutionCause::InvalidUrl("empty proxy URL".to_string()),
            ));
        }

        let mut url = Url::parse(&issued.proxy_url).map_err(|e| {
            ResolutionError::new(
                track.id.clone(),
                ResolutionCause::InvalidUrl(format!("{}: {e}", issued.proxy_url)),
            )
        })?;
        url.query_pairs_mut()
            .append_pair(TRACK_ID_PARAM, track.id.as_str());

        let url = String::from(url);
        debug!(track_id = %track.id, url = %url, expires_at = %issued.expires_at, "Issued play URL");

        Ok(ResolvedSource {
            kind: self.origin.classify(&url),
            url,
            expires_at: Some(issued.expires_at),
            refreshed: true,
        })
    }
}
