/// Time-limited play URL issued by the backend
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A proxy URL the device may stream directly, valid until `expires_at`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayUrl {
    /// Backend-issued proxy URL
    pub proxy_url: String,

    /// Absolute expiry of the upstream stream behind the proxy
    pub expires_at: DateTime<Utc>,
}

impl PlayUrl {
    /// Create a play URL
    pub fn new(proxy_url: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            expires_at,
        }
    }
}
