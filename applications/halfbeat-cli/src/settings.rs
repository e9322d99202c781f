/// CLI settings
use halfbeat_client::ClientConfig;
use halfbeat_playback::{PlaybackConfig, SourceOrigin};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_CONFIG_FILE: &str = "halfbeat.toml";
const ENV_PREFIX: &str = "HALFBEAT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub client: ClientConfig,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; without one `halfbeat.toml` in the
    /// working directory is used when present. `HALFBEAT_<SECTION>__<KEY>`
    /// variables override file values.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, environment())
    }

    pub(crate) fn load_with_env(path: Option<&Path>, env: config::Environment) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Load(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path.to_path_buf()));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(env);

        let config = settings
            .build()
            .map_err(|e| ConfigError::Load(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| ConfigError::Load(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let base_url = &self.client.base_url;
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "client.base_url must be an http(s) URL, got {base_url:?}"
            )));
        }

        SourceOrigin::parse(&self.playback.proxy_origin)
            .map_err(|e| ConfigError::Invalid(format!("playback.proxy_origin: {e}")))?;

        if !(0.0..=1.0).contains(&self.playback.volume) {
            return Err(ConfigError::Invalid(format!(
                "playback.volume must be within [0, 1], got {}",
                self.playback.volume
            )));
        }

        if self.playback.local_probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "playback.local_probe_timeout_ms must be positive".to_string(),
            ));
        }

        if self.playback.expiry_margin_secs < 0 {
            return Err(ConfigError::Invalid(
                "playback.expiry_margin_secs cannot be negative".to_string(),
            ));
        }

        if self.client.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "client.timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
