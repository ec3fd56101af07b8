use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use std::time::Duration;

/// Environment variable pointing at a TOML config file.
pub const CONFIG_ENV: &str = "YT_PLAYER_NG_CONFIG";

/// Display options forwarded to the remote player when it is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerOptions {
    pub width: u32,
    pub height: u32,
    /// Opaque playback variables, passed through verbatim.
    pub player_vars: Map<String, Value>,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 390,
            player_vars: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub player: PlayerOptions,
    pub timeupdate_interval_ms: u64,
    pub event_capacity: usize,
    pub metadata_endpoint: String,
    pub user_agent: String,
    pub timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            player: PlayerOptions::default(),
            timeupdate_interval_ms: 250,
            event_capacity: 64,
            metadata_endpoint: "https://www.youtube.com/oembed".to_string(),
            user_agent: format!("yt-player-ng/{}", env!("CARGO_PKG_VERSION")),
            timeout: 30,
        }
    }
}

impl Config {
    /// Loads from `$YT_PLAYER_NG_CONFIG` when set, otherwise defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load_from(path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Config =
            toml::from_str(&raw).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeupdate_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeupdate_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeupdate_interval(&self) -> Duration {
        Duration::from_millis(self.timeupdate_interval_ms)
    }
}
