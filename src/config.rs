//! Configuration for the blinkwell agent.

use crate::detector::DetectorConfig;
use crate::session::WellnessConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the agent.
///
/// Loaded once at session start and immutable for that session's lifetime;
/// only the `paused` flag is flipped across processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Blink detection parameters
    pub detector: DetectorConfig,

    /// Wellness alerting parameters
    pub wellness: WellnessConfig,

    /// Interval between aggregator heartbeat ticks
    #[serde(with = "duration_serde")]
    pub heartbeat_interval: Duration,

    /// Path for exporting finalized session records
    pub export_path: PathBuf,

    /// Path for storing state and diagnostics
    pub data_path: PathBuf,

    /// Whether tracking is currently paused
    pub paused: bool,

    /// Wellness backend base URL for session upload, if any
    pub backend_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blinkwell-agent");

        Self {
            detector: DetectorConfig::default(),
            wellness: WellnessConfig::default(),
            heartbeat_interval: Duration::from_secs(1),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            paused: false,
            backend_url: None,
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(&config_path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("blinkwell-agent")
            .join("config.json")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.export_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(&self.data_path)
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Reject parameter combinations the state machines cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.detector.ear_threshold) {
            return Err(ConfigError::Invalid(
                "detector.ear_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.detector.min_closed_frames == 0 {
            return Err(ConfigError::Invalid(
                "detector.min_closed_frames must be at least 1".to_string(),
            ));
        }
        if self.detector.max_blink_frames < self.detector.min_closed_frames {
            return Err(ConfigError::Invalid(
                "detector.max_blink_frames must not be below min_closed_frames".to_string(),
            ));
        }
        if self.detector.refractory_ms < 0 {
            return Err(ConfigError::Invalid(
                "detector.refractory_ms must not be negative".to_string(),
            ));
        }
        if self.wellness.window_secs == 0 {
            return Err(ConfigError::Invalid(
                "wellness.window_secs must be at least 1".to_string(),
            ));
        }
        if self.wellness.min_blinks_per_minute < 0.0 {
            return Err(ConfigError::Invalid(
                "wellness.min_blinks_per_minute must not be negative".to_string(),
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "heartbeat_interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
            ConfigError::SerializeError(e) => write!(f, "Serialize error: {e}"),
            ConfigError::Invalid(e) => write!(f, "Invalid configuration: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Serde support for Duration.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!((config.detector.ear_threshold - 0.21).abs() < 1e-12);
        assert_eq!(config.detector.min_closed_frames, 2);
        assert_eq!(config.wellness.window_secs, 60);
        assert!((config.wellness.min_blinks_per_minute - 15.0).abs() < 1e-12);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(1));
        assert!(!config.paused);
        assert!(config.backend_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_threshold() {
        let mut config = Config::default();
        config.detector.ear_threshold = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_inverted_frame_bounds() {
        let mut config = Config::default();
        config.detector.min_closed_frames = 9;
        config.detector.max_blink_frames = 4;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).expect("serialize");
        let parsed: Config = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed.heartbeat_interval, config.heartbeat_interval);
        assert_eq!(
            parsed.detector.min_closed_frames,
            config.detector.min_closed_frames
        );
    }
}
