//! Configuration types.
//!
//! Configuration lives in `stage.toml` under the platform config directory.
//! Every field has a default, so a missing file or a partial file is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Runtime configuration loaded from `stage.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Animation settings
    #[serde(default)]
    pub animation: AnimationSettings,

    /// State manager settings
    #[serde(default)]
    pub manager: ManagerSettings,
}

/// Animation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationSettings {
    /// Global animation switch (e.g. reduced motion, test mode).
    pub enabled: bool,

    /// Multiplier applied by hosts to state transition durations.
    pub duration_scale: f32,

    /// Looper frame step in milliseconds.
    pub frame_interval_ms: u64,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_scale: 1.0,
            frame_interval_ms: 16,
        }
    }
}

impl AnimationSettings {
    /// Frame step as a `Duration`, never zero.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }

    /// Scale a duration by `duration_scale`.
    ///
    /// Negative scales clamp to zero, a NaN scale leaves the duration as is
    /// and a result too large for `Duration` saturates.
    pub fn scale(&self, duration: Duration) -> Duration {
        if self.duration_scale.is_nan() {
            return duration;
        }
        let scale = f64::from(self.duration_scale.max(0.0));
        Duration::try_from_secs_f64(duration.as_secs_f64() * scale).unwrap_or(Duration::MAX)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.duration_scale.is_finite() {
            return Err(ConfigError::Parse(format!(
                "animation.duration_scale must be finite, got {}",
                self.duration_scale
            )));
        }
        Ok(())
    }
}

/// State manager settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerSettings {
    /// Upper bound on reset passes in a single cancellation.
    pub max_cancel_iterations: usize,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_cancel_iterations: 32,
        }
    }
}

impl StageConfig {
    /// Parse a config from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.animation.validate()?;
        Ok(config)
    }

    /// Load a config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Load `stage.toml` from the config directory, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path().ok_or(ConfigError::NoConfigDir)?;
        if !path.exists() {
            tracing::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        tracing::info!("Loading config from {}", path.display());
        Self::load_from(&path)
    }
}

/// Get the config directory path.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("stage"))
}

/// Get the path to stage.toml.
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join("stage.toml"))
}

/// Ensure the config directory exists.
pub fn ensure_config_dir() -> std::io::Result<()> {
    if let Some(dir) = config_dir() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
