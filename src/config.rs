//! Persisted application settings.
//!
//! Stored as pretty JSON under the platform config directory. Every field
//! has a serde default so files written by older versions keep loading.

use crate::error::ConfigError;
use crate::session::SessionOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Current configuration file format version.
pub const CONFIG_VERSION: u32 = 1;

const APP_DIR: &str = "yolo-annotate";
const CONFIG_FILE: &str = "config.json";

/// Log level setting for the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub log_level: LogLevel,

    /// Dataset directory opened last, reopened on startup
    #[serde(default)]
    pub last_dataset_dir: Option<PathBuf>,

    /// Class file loaded last
    #[serde(default)]
    pub last_classes_file: Option<PathBuf>,

    /// Stay in draw mode after each committed box
    #[serde(default)]
    pub keep_draw_mode: bool,

    /// Scale factor per wheel notch
    #[serde(default = "default_zoom_step")]
    pub zoom_step: f64,

    /// Smallest accepted box edge, in image pixels (exclusive)
    #[serde(default = "default_min_box_size")]
    pub min_box_size: i32,
}

fn default_version() -> u32 {
    CONFIG_VERSION
}

fn default_zoom_step() -> f64 {
    1.1
}

fn default_min_box_size() -> i32 {
    2
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            log_level: LogLevel::default(),
            last_dataset_dir: None,
            last_classes_file: None,
            keep_draw_mode: false,
            zoom_step: default_zoom_step(),
            min_box_size: default_min_box_size(),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("No config file found at {:?}", path);
            return Ok(Self::default());
        }
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from the platform config directory.
    pub fn load_default_location() -> Result<Self, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        log::debug!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            keep_draw_mode: self.keep_draw_mode,
            zoom_step: self.zoom_step,
            min_box_size: self.min_box_size,
        }
    }

    /// Replace out-of-range tunables with their defaults.
    fn sanitize(&mut self) {
        if !(self.zoom_step > 1.0 && self.zoom_step < 2.0) {
            log::warn!(
                "zoom_step {} out of range (1, 2), using {}",
                self.zoom_step,
                default_zoom_step()
            );
            self.zoom_step = default_zoom_step();
        }
        if self.min_box_size < 0 {
            log::warn!("min_box_size {} is negative, using 0", self.min_box_size);
            self.min_box_size = 0;
        }
    }
}
