//! Application configuration
//!
//! Configuration is read from an optional TOML file and overridden by
//! command line arguments in `main`. Every section has serde defaults so a
//! missing or partial file yields a working server.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server settings
    pub web: WebConfig,
    /// Signaling relay settings
    pub signaling: SignalingConfig,
    /// Recording storage settings
    pub recordings: RecordingsConfig,
    /// Transcode pipeline settings
    pub transcode: TranscodeConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            signaling: SignalingConfig::default(),
            recordings: RecordingsConfig::default(),
            transcode: TranscodeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// no path is given
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read config file {}: {}", path.display(), e)
                })?;
                let config = toml::from_str(&raw).map_err(|e| {
                    anyhow::anyhow!("Failed to parse config file {}: {}", path.display(), e)
                })?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }
}

/// Web server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address
    pub bind_address: String,
    /// HTTP port
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Signaling relay configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalingConfig {
    /// Whether watchers are told the old stream stopped when a new
    /// broadcaster silently replaces the current one. Off by default: the
    /// replacement transition historically carries no announcement.
    pub announce_replaced_broadcaster: bool,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            announce_replaced_broadcaster: false,
        }
    }
}

/// Recording storage configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingsConfig {
    /// Directory the per-kind recording trees live under
    pub data_dir: String,
    /// Maximum age of a stored recording in days
    pub retention_days: u32,
    /// Hours between retention sweeps
    pub sweep_interval_hours: u64,
}

impl Default for RecordingsConfig {
    fn default() -> Self {
        Self {
            data_dir: "recordings".to_string(),
            retention_days: 15,
            sweep_interval_hours: 24,
        }
    }
}

/// Transcode pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Conversion program
    pub ffmpeg: String,
    /// Duration probe program
    pub ffprobe: String,
    /// x264 speed/quality preset
    pub preset: String,
}

impl Default for TranscodeConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            preset: "veryfast".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.recordings.retention_days, 15);
        assert_eq!(config.recordings.sweep_interval_hours, 24);
        assert_eq!(config.transcode.ffmpeg, "ffmpeg");
        assert!(!config.signaling.announce_replaced_broadcaster);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let raw = r#"
            [web]
            port = 8080

            [recordings]
            retention_days = 7
        "#;
        let config: AppConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.web.port, 8080);
        assert_eq!(config.web.bind_address, "0.0.0.0");
        assert_eq!(config.recordings.retention_days, 7);
        assert_eq!(config.transcode.ffprobe, "ffprobe");
    }

    #[test]
    fn test_load_missing_path_uses_defaults() {
        let config = AppConfig::load(None).unwrap();
        assert_eq!(config.recordings.data_dir, "recordings");
    }
}
