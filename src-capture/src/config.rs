//! Pipeline configuration persisted as JSON.

use crate::capture::DEFAULT_MAX_POOLED_BUFFERS;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine the configuration directory")]
    NoConfigDir,

    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Initial settings of a [`CapturePipeline`](crate::CapturePipeline).
///
/// The three flags can still be changed on the pipeline afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub skip_first_frame: bool,
    pub skip_frames: bool,
    pub preserve_buffer: bool,
    /// Upper bound of one acquire attempt; bounds the capture thread's stop latency.
    pub acquire_timeout_ms: u64,
    /// Upper bound of one queue wait; bounds the callback thread's stop latency.
    pub callback_poll_ms: u64,
    /// Freed frame buffers kept for reuse per cycle.
    pub max_pooled_buffers: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            skip_first_frame: true,
            skip_frames: true,
            preserve_buffer: false,
            acquire_timeout_ms: 100,
            callback_poll_ms: 10,
            max_pooled_buffers: DEFAULT_MAX_POOLED_BUFFERS,
        }
    }
}

impl CaptureConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms.max(1))
    }

    pub fn callback_poll(&self) -> Duration {
        Duration::from_millis(self.callback_poll_ms.max(1))
    }
}

fn config_path() -> Result<PathBuf, ConfigError> {
    framecap_common::paths::config_file().ok_or(ConfigError::NoConfigDir)
}

/// Load the user's configuration, falling back to defaults on any failure.
pub fn load_config() -> CaptureConfig {
    let path = match config_path() {
        Ok(path) => path,
        Err(e) => {
            warn!("{}, using default configuration", e);
            return CaptureConfig::default();
        }
    };

    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return CaptureConfig::default();
    }

    match load_config_from(&path) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Failed to load config: {}. Using defaults.", e);
            CaptureConfig::default()
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

/// Save to the user's config file, creating its directory if needed.
pub fn save_config(config: &CaptureConfig) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    save_config_to(config, &path)?;
    Ok(path)
}

pub fn save_config_to(config: &CaptureConfig, path: &Path) -> Result<(), ConfigError> {
    let io_error = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).map_err(io_error)?;

    info!("Saved config to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert!(config.skip_first_frame);
        assert!(config.skip_frames);
        assert!(!config.preserve_buffer);
        assert_eq!(config.acquire_timeout(), Duration::from_millis(100));
        assert_eq!(config.callback_poll(), Duration::from_millis(10));
        assert_eq!(config.max_pooled_buffers, DEFAULT_MAX_POOLED_BUFFERS);
    }

    #[test]
    fn test_config_backward_compatible() {
        let json = r#"{"preserve_buffer": true}"#;
        let config: CaptureConfig = serde_json::from_str(json).unwrap();
        assert!(config.preserve_buffer);
        assert!(config.skip_first_frame);
        assert_eq!(config.acquire_timeout_ms, 100);
    }

    #[test]
    fn test_zero_timeouts_are_clamped() {
        let config = CaptureConfig {
            acquire_timeout_ms: 0,
            callback_poll_ms: 0,
            ..CaptureConfig::default()
        };
        assert_eq!(config.acquire_timeout(), Duration::from_millis(1));
        assert_eq!(config.callback_poll(), Duration::from_millis(1));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = CaptureConfig {
            skip_frames: false,
            callback_poll_ms: 25,
            ..CaptureConfig::default()
        };

        save_config_to(&config, &path).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_file_is_json_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Json(_))));
    }
}
