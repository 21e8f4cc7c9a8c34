//! Configuration loading

use anyhow::Result;
use planescope_core::{PlaneDetection, SessionOptions, WorldTrackingConfiguration};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Detect floors, tables, seats, and ceilings
    #[serde(default = "default_true")]
    pub horizontal_planes: bool,
    /// Detect walls, doors, and windows
    #[serde(default = "default_true")]
    pub vertical_planes: bool,
    /// Recorded session to replay (built-in demo room when unset)
    #[serde(default)]
    pub recording: Option<PathBuf>,
    /// Playback speed multiplier
    #[serde(default = "default_playback_rate")]
    pub playback_rate: f32,
    /// Restart the recording when it ends
    #[serde(default)]
    pub looping: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            horizontal_planes: true,
            vertical_planes: true,
            recording: None,
            playback_rate: default_playback_rate(),
            looping: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Window title
    #[serde(default = "default_title")]
    pub title: String,
    /// Keep rendering continuously instead of idling between input events
    #[serde(default = "default_true")]
    pub keep_awake: bool,
    /// Show the classification legend
    #[serde(default = "default_true")]
    pub show_legend: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            keep_awake: true,
            show_legend: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_playback_rate() -> f32 {
    1.0
}

fn default_title() -> String {
    "planescope".to_string()
}

impl Config {
    /// Tracking configuration used when the view attaches
    pub fn tracking_configuration(&self) -> WorldTrackingConfiguration {
        WorldTrackingConfiguration {
            plane_detection: PlaneDetection {
                horizontal: self.session.horizontal_planes,
                vertical: self.session.vertical_planes,
            },
        }
    }

    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            playback_rate: self.session.playback_rate,
            looping: self.session.looping,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    } else {
        info!(
            path = %path.display(),
            "Configuration file not found, using defaults"
        );
        Ok(Config::default())
    }
}

/// Save default configuration to file
pub fn save_default_config(path: &Path) -> Result<()> {
    let config = Config {
        session: SessionConfig {
            recording: Some(PathBuf::from("sessions/living-room.json")),
            ..SessionConfig::default()
        },
        display: DisplayConfig::default(),
    };

    let content = toml::to_string_pretty(&config)?;
    std::fs::write(path, content)?;
    Ok(())
}
