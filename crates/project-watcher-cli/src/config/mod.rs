//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use project_watcher::{MonitorConfig, Resolution};

/// Settings file looked up in the project directory.
pub const SETTINGS_FILENAME: &str = "project-watcher.toml";

/// Environment variable naming the project directory.
pub const PROJECT_DIR_ENV: &str = "PROJECT_WATCHER_DIR";

/// Errors from loading settings.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Resolve the project directory.
pub fn resolve_project_path(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var(PROJECT_DIR_ENV) {
        if !env_path.trim().is_empty() {
            return PathBuf::from(env_path);
        }
    }

    PathBuf::from(".")
}

/// Contents of `project-watcher.toml`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct WatchSettings {
    #[serde(default)]
    pub policy: PolicySettings,
    #[serde(default)]
    pub capture: CaptureSettings,
}

/// Decision policy, in seconds and fractions.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PolicySettings {
    #[serde(default = "default_consideration_interval")]
    pub consideration_interval_secs: f64,
    #[serde(default = "default_min_save_interval")]
    pub min_save_interval_secs: f64,
    #[serde(default = "default_min_stable_duration")]
    pub min_stable_duration_secs: f64,
    #[serde(default = "default_start_up_grace")]
    pub start_up_grace_secs: f64,
    #[serde(default = "default_megapixel_ceiling")]
    pub comparison_megapixel_ceiling: f64,
    #[serde(default = "default_change_threshold")]
    pub change_threshold: f64,
    #[serde(default = "default_binarization_threshold")]
    pub binarization_threshold: u8,
}

fn default_consideration_interval() -> f64 {
    1.0
}

fn default_min_save_interval() -> f64 {
    5.0
}

fn default_min_stable_duration() -> f64 {
    30.0
}

fn default_start_up_grace() -> f64 {
    10.0
}

fn default_megapixel_ceiling() -> f64 {
    0.5
}

fn default_change_threshold() -> f64 {
    1e-5
}

fn default_binarization_threshold() -> u8 {
    project_watcher::compare::DEFAULT_BINARIZATION_THRESHOLD
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            consideration_interval_secs: default_consideration_interval(),
            min_save_interval_secs: default_min_save_interval(),
            min_stable_duration_secs: default_min_stable_duration(),
            start_up_grace_secs: default_start_up_grace(),
            comparison_megapixel_ceiling: default_megapixel_ceiling(),
            change_threshold: default_change_threshold(),
            binarization_threshold: default_binarization_threshold(),
        }
    }
}

/// Requested device resolution and output encoding.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CaptureSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_width() -> u32 {
    Resolution::default().width
}

fn default_height() -> u32 {
    Resolution::default().height
}

fn default_jpeg_quality() -> u8 {
    project_watcher::history::DEFAULT_JPEG_QUALITY
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

impl WatchSettings {
    /// Load settings from `explicit`, or from the project's settings file if
    /// present. An explicit path must exist; a missing project file means
    /// defaults.
    pub fn load(explicit: Option<&Path>, project_dir: &Path) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (project_dir.join(SETTINGS_FILENAME), false),
        };

        if !required && !path.exists() {
            tracing::debug!("No {} in {}, using defaults", SETTINGS_FILENAME, project_dir.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let settings = Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        tracing::info!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Policy as a [`MonitorConfig`].
    pub fn monitor_config(&self) -> Result<MonitorConfig, ConfigError> {
        let p = &self.policy;
        Ok(MonitorConfig {
            consideration_interval: seconds("consideration_interval_secs", p.consideration_interval_secs)?,
            min_save_interval: seconds("min_save_interval_secs", p.min_save_interval_secs)?,
            min_stable_duration: seconds("min_stable_duration_secs", p.min_stable_duration_secs)?,
            start_up_grace: seconds("start_up_grace_secs", p.start_up_grace_secs)?,
            comparison_megapixel_ceiling: p.comparison_megapixel_ceiling,
            change_threshold: p.change_threshold,
            binarization_threshold: p.binarization_threshold,
        })
    }

    pub fn resolution(&self) -> Resolution {
        Resolution {
            width: self.capture.width,
            height: self.capture.height,
        }
    }
}

fn seconds(field: &'static str, secs: f64) -> Result<TimeDelta, ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("expected a non-negative number of seconds, got {secs}"),
        });
    }
    let millis = (secs * 1000.0).round();
    TimeDelta::try_milliseconds(millis as i64).ok_or_else(|| ConfigError::Invalid {
        field,
        reason: format!("{secs} seconds is out of range"),
    })
}
