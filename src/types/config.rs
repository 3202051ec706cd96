use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Optional settings file looked up in the current directory at startup.
pub const CONFIG_FILE: &str = "midiroll.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub refresh_interval_ms: u64,
    /// Bounded wait for pipeline state queries; never longer than the refresh interval.
    pub state_query_timeout_ms: u64,
    pub log_level: String,
    pub render: RenderSettings,
    /// Directory for the working and staged video. A fresh temp dir when unset.
    pub work_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: 30,
            state_query_timeout_ms: 30,
            log_level: "info".to_string(),
            render: RenderSettings::default(),
            work_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Seconds of music visible across the frame.
    pub window_secs: f64,
    pub lowest_key: u8,
    pub highest_key: u8,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 30,
            window_secs: 4.0,
            lowest_key: 21,
            highest_key: 108,
        }
    }
}

impl AppConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn state_query_timeout(&self) -> Duration {
        Duration::from_millis(self.state_query_timeout_ms.min(self.refresh_interval_ms))
    }

    pub fn max_log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    /// Save the config to a JSON file at the given path.
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::create(path).map_err(io_err)?;
        file.write_all(json.as_bytes()).map_err(io_err)
    }

    /// Load a config from a JSON file at the given path.
    pub fn load_from_file(path: &Path) -> Result<AppConfig, ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut file = File::open(path).map_err(io_err)?;
        let mut json = String::new();
        file.read_to_string(&mut json).map_err(io_err)?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults when the file is absent; the error is handed back when it is present but unusable.
    pub fn load_or_default(path: &Path) -> (AppConfig, Option<ConfigError>) {
        if !path.exists() {
            return (AppConfig::default(), None);
        }
        match AppConfig::load_from_file(path) {
            Ok(config) => (config, None),
            Err(err) => (AppConfig::default(), Some(err)),
        }
    }
}
