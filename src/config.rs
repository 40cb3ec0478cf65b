//! Configuration management for BoardSight
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `BOARDSIGHT_<SECTION>__<KEY>` environment variables, then the
//! `BOARDSIGHT_API_BASE_URL` shortcut for the service address.

use crate::errors::BoardSightError;
use crate::reconciler::StreamPolicy;
use crate::types::{DetectorSelection, EngineOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding `service.base_url`.
pub const BASE_URL_ENV: &str = "BOARDSIGHT_API_BASE_URL";
const ENV_PREFIX: &str = "BOARDSIGHT";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardSightConfig {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub engine: EngineConfig,
    pub reconcile: ReconcileConfig,
}

/// Detection service endpoint settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base HTTP address of the detection service
    pub base_url: String,
    /// Detector used when the caller does not pick one
    pub default_detector: String,
    /// Default timeout for one-shot requests in milliseconds
    pub request_timeout_ms: u64,
    /// Streaming channel connect timeout in milliseconds
    pub connect_timeout_ms: u64,
}

/// Frame sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Delay between the end of one send attempt and the next sample
    pub interval_ms: u64,
    /// Resolution used while the video source reports zero dimensions
    pub fallback_resolution: [u32; 2],
    /// Frame encoding (png, jpeg)
    pub frame_format: String,
    /// JPEG quality (1-100), used when frame_format is jpeg
    pub jpeg_quality: u8,
}

/// Default engine parameters for best-move queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub depth: u32,
    pub time_ms: u64,
}

/// Result reconciliation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// arrival_order or hold_after_one_shot
    pub policy: String,
    /// Hold window for hold_after_one_shot in milliseconds
    pub hold_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            default_detector: DetectorSelection::LICHESS.to_string(),
            request_timeout_ms: 15_000,
            connect_timeout_ms: 5_000,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            interval_ms: 600,
            fallback_resolution: [640, 480],
            frame_format: "png".to_string(),
            jpeg_quality: 85,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let defaults = EngineOptions::default();
        Self {
            depth: defaults.depth,
            time_ms: defaults.time_ms,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            policy: "arrival_order".to_string(),
            hold_ms: 2_000,
        }
    }
}

impl ServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn detector(&self) -> Result<DetectorSelection, BoardSightError> {
        Ok(DetectorSelection::new(&self.default_detector)?)
    }
}

impl CaptureConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions::new(self.depth, self.time_ms)
    }
}

impl ReconcileConfig {
    pub fn stream_policy(&self) -> Result<StreamPolicy, BoardSightError> {
        match self.policy.as_str() {
            "arrival_order" => Ok(StreamPolicy::ArrivalOrder),
            "hold_after_one_shot" => Ok(StreamPolicy::HoldAfterOneShot {
                hold: Duration::from_millis(self.hold_ms),
            }),
            other => Err(BoardSightError::Config(format!(
                "unknown reconcile policy '{}'",
                other
            ))),
        }
    }
}

impl BoardSightConfig {
    /// Load configuration from TOML file, environment, and defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, BoardSightError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| BoardSightError::Config(format!("Failed to read config: {}", e)))?;

        let mut loaded: BoardSightConfig = settings
            .try_deserialize()
            .map_err(|e| BoardSightError::Config(format!("Failed to parse config: {}", e)))?;

        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            if !base_url.trim().is_empty() {
                log::debug!("Service address overridden by {}", BASE_URL_ENV);
                loaded.service.base_url = base_url.trim().to_string();
            }
        }

        loaded.validate().map_err(BoardSightError::Config)?;
        log::info!("Loaded configuration (service at {})", loaded.service.base_url);
        Ok(loaded)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), BoardSightError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| BoardSightError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, toml_string)?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Get default config file path
    pub fn default_path() -> PathBuf {
        PathBuf::from("boardsight.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        let base = self.service.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(format!(
                "Service base_url must start with http:// or https:// (got '{}')",
                base
            ));
        }
        if reqwest::Url::parse(base).is_err() {
            return Err(format!("Service base_url is not a valid URL: '{}'", base));
        }
        DetectorSelection::new(&self.service.default_detector).map_err(|e| e.to_string())?;
        if self.service.request_timeout_ms == 0 {
            return Err("Request timeout must be positive".to_string());
        }
        if self.service.connect_timeout_ms == 0 {
            return Err("Connect timeout must be positive".to_string());
        }

        if self.capture.interval_ms == 0 || self.capture.interval_ms > 60_000 {
            return Err("Capture interval must be between 1 and 60000 ms".to_string());
        }
        if self.capture.fallback_resolution[0] == 0 || self.capture.fallback_resolution[1] == 0 {
            return Err("Invalid fallback resolution".to_string());
        }
        if !matches!(self.capture.frame_format.as_str(), "png" | "jpeg") {
            return Err(format!(
                "Frame format must be png or jpeg (got '{}')",
                self.capture.frame_format
            ));
        }
        if self.capture.jpeg_quality == 0 || self.capture.jpeg_quality > 100 {
            return Err("JPEG quality must be between 1 and 100".to_string());
        }

        self.engine.options().validate().map_err(|e| e.to_string())?;
        self.reconcile.stream_policy().map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BoardSightConfig::default();
        assert_eq!(config.service.base_url, "http://localhost:8000");
        assert_eq!(config.service.default_detector, "lichess");
        assert_eq!(config.capture.interval_ms, 600);
        assert_eq!(config.capture.fallback_resolution, [640, 480]);
        assert_eq!(config.engine.options(), EngineOptions::new(12, 800));
        assert_eq!(
            config.reconcile.stream_policy().unwrap(),
            StreamPolicy::ArrivalOrder
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut bad = BoardSightConfig::default();
        bad.service.base_url = "ftp://example".to_string();
        assert!(bad.validate().is_err());

        let mut bad = BoardSightConfig::default();
        bad.capture.fallback_resolution = [0, 480];
        assert!(bad.validate().is_err());

        let mut bad = BoardSightConfig::default();
        bad.capture.frame_format = "gif".to_string();
        assert!(bad.validate().is_err());

        let mut bad = BoardSightConfig::default();
        bad.engine.depth = 99;
        assert!(bad.validate().is_err());

        let mut bad = BoardSightConfig::default();
        bad.reconcile.policy = "newest_frame".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_hold_policy_parsing() {
        let mut config = BoardSightConfig::default();
        config.reconcile.policy = "hold_after_one_shot".to_string();
        config.reconcile.hold_ms = 750;
        assert_eq!(
            config.reconcile.stream_policy().unwrap(),
            StreamPolicy::HoldAfterOneShot {
                hold: Duration::from_millis(750)
            }
        );
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("boardsight.toml");

        let mut config = BoardSightConfig::default();
        config.service.base_url = "http://10.0.0.5:9000".to_string();
        config.capture.frame_format = "jpeg".to_string();
        config.engine.depth = 18;
        config.save_to_file(&path).unwrap();

        let loaded = BoardSightConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.capture.frame_format, "jpeg");
        assert_eq!(loaded.engine.depth, 18);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.toml");
        fs::write(&path, "[capture]\ninterval_ms = 250\n").unwrap();

        let loaded = BoardSightConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.capture.interval_ms, 250);
        assert_eq!(loaded.capture.fallback_resolution, [640, 480]);
        assert_eq!(loaded.engine.time_ms, 800);
    }

    #[test]
    fn test_config_toml_format() {
        let toml_string = toml::to_string_pretty(&BoardSightConfig::default()).unwrap();
        assert!(toml_string.contains("[service]"));
        assert!(toml_string.contains("[capture]"));
        assert!(toml_string.contains("[engine]"));
        assert!(toml_string.contains("[reconcile]"));
        assert!(toml_string.contains("base_url"));
    }

    #[test]
    fn test_load_nonexistent_file() {
        let loaded = BoardSightConfig::load_from_file("definitely_missing_boardsight.toml");
        assert!(loaded.is_ok());
        assert_eq!(loaded.unwrap().capture.interval_ms, 600);
    }
}
