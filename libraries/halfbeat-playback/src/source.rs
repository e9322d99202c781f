//! Source URL classification
//!
//! Proxy URLs (`<origin>/audio...`) are time-limited and refreshable; local
//! cache URLs (`<origin>/local...`) point at a downloaded copy. Anything else
//! is played as given.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use url::Url;

const PROXY_PATH: &str = "/audio";
const LOCAL_PATH: &str = "/local";

/// Where a bound URL comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// Downloaded copy served by the local proxy
    Local,

    /// Time-limited stream served by the proxy
    Proxy,

    /// Any other URL, played as-is
    Direct,
}

/// Origin that serves proxy and local cache URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceOrigin {
    origin: Url,
}

impl SourceOrigin {
    /// Parse the origin (`scheme://host:port`)
    pub fn parse(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin)
            .map_err(|e| PlaybackError::Config(format!("invalid proxy origin {origin:?}: {e}")))?;
        if origin.host_str().is_none() {
            return Err(PlaybackError::Config(format!(
                "proxy origin {origin} has no host"
            )));
        }
        Ok(Self { origin })
    }

    /// Classify a URL
    pub fn classify(&self, url: &str) -> SourceKind {
        let Ok(parsed) = Url::parse(url) else {
            return SourceKind::Direct;
        };
        if !self.same_origin(&parsed) {
            return SourceKind::Direct;
        }

        let path = parsed.path();
        if has_segment_prefix(path, PROXY_PATH) {
            SourceKind::Proxy
        } else if has_segment_prefix(path, LOCAL_PATH) {
            SourceKind::Local
        } else {
            SourceKind::Direct
        }
    }

    /// Whether `url` is a refreshable proxy URL
    pub fn is_proxy(&self, url: &str) -> bool {
        self.classify(url) == SourceKind::Proxy
    }

    /// The origin as a string
    pub fn as_str(&self) -> &str {
        self.origin.as_str()
    }

    fn same_origin(&self, url: &Url) -> bool {
        url.scheme() == self.origin.scheme()
            && url.host_str() == self.origin.host_str()
            && url.port_or_known_default() == self.origin.port_or_known_default()
    }
}

fn has_segment_prefix(path: &str, prefix: &str) -> bool {
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/') || rest.starts_with('?'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> SourceOrigin {
        SourceOrigin::parse("http://127.0.0.1:9999").unwrap()
    }

    #[test]
    fn classifies_proxy_urls() {
        assert_eq!(
            origin().classify("http://127.0.0.1:9999/audio?u=abc&sid=t1"),
            SourceKind::Proxy
        );
        assert_eq!(
            origin().classify("http://127.0.0.1:9999/audio/stream"),
            SourceKind::Proxy
        );
    }

    #[test]
    fn classifies_local_urls() {
        assert_eq!(
            origin().classify("http://127.0.0.1:9999/local/t1.m4a"),
            SourceKind::Local
        );
    }

    #[test]
    fn other_hosts_and_paths_are_direct() {
        assert_eq!(
            origin().classify("http://127.0.0.1:8080/audio?u=x"),
            SourceKind::Direct
        );
        assert_eq!(
            origin().classify("https://cdn.example.com/audio/1.mp3"),
            SourceKind::Direct
        );
        assert_eq!(
            origin().classify("http://127.0.0.1:9999/audiobook"),
            SourceKind::Direct
        );
        assert_eq!(origin().classify("not a url"), SourceKind::Direct);
    }

    #[test]
    fn rejects_bad_origin() {
        assert!(matches!(
            SourceOrigin::parse("127.0.0.1:9999/x"),
            Err(PlaybackError::Config(_))
        ));
    }
}
