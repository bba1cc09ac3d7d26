//! Configuration file management
//!
//! Loads TOML configuration files and provides device and calibration settings.
//! Default config path: ~/.config/crtcal/config.toml

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    CARD_PREFIX, DRI_DIR, FRAMEBUFFER_PREFIX, NEUTRAL_BRIGHTNESS, NEUTRAL_CONTRAST,
    NEUTRAL_GAMMA,
};
use crate::gamma::{Channel, CurveParams};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Device node locations
    pub devices: DeviceConfig,
    /// Calibration applied by `--apply`
    pub calibration: CalibrationConfig,
}

/// Device node settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Directory with DRM nodes
    pub dri_dir: String,
    /// DRM node name prefix, followed by the card index
    pub card_prefix: String,
    /// Framebuffer path prefix, followed by the framebuffer index
    pub framebuffer_prefix: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            dri_dir: DRI_DIR.to_string(),
            card_prefix: CARD_PREFIX.to_string(),
            framebuffer_prefix: FRAMEBUFFER_PREFIX.to_string(),
        }
    }
}

impl DeviceConfig {
    /// Path of DRM card `index` (e.g. /dev/dri/card0)
    pub fn card_path(&self, index: usize) -> PathBuf {
        Path::new(&self.dri_dir).join(format!("{}{}", self.card_prefix, index))
    }

    /// Path of framebuffer `index` (e.g. /dev/fb0)
    pub fn framebuffer_path(&self, index: usize) -> PathBuf {
        PathBuf::from(format!("{}{}", self.framebuffer_prefix, index))
    }
}

/// Calibration settings
///
/// Arrays are indexed red, green, blue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Gamma per channel (1.0 = linear)
    pub gamma: [f64; 3],
    /// Contrast per channel (output level at full input, 1.0 = full)
    pub contrast: [f64; 3],
    /// Brightness per channel (output level at zero input, 0.0 = black)
    pub brightness: [f64; 3],
    /// Per-monitor overrides, matched by EDID
    #[serde(rename = "monitor", skip_serializing_if = "Vec::is_empty")]
    pub monitors: Vec<MonitorCalibration>,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            gamma: [NEUTRAL_GAMMA; 3],
            contrast: [NEUTRAL_CONTRAST; 3],
            brightness: [NEUTRAL_BRIGHTNESS; 3],
            monitors: Vec::new(),
        }
    }
}

/// Calibration for one monitor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorCalibration {
    /// Hex-encoded EDID (case-insensitive)
    pub edid: String,
    pub gamma: [f64; 3],
    pub contrast: [f64; 3],
    pub brightness: [f64; 3],
}

impl CalibrationConfig {
    /// Curve parameters for `channel` on the monitor with `edid`
    ///
    /// A monitor entry whose EDID matches wins over the defaults.
    pub fn params_for(&self, edid: Option<&str>, channel: Channel) -> CurveParams {
        let c = channel.index();
        let monitor = edid.and_then(|edid| {
            self.monitors
                .iter()
                .find(|m| m.edid.eq_ignore_ascii_case(edid))
        });
        match monitor {
            Some(m) => CurveParams::new(m.gamma[c], m.contrast[c], m.brightness[c]),
            None => CurveParams::new(self.gamma[c], self.contrast[c], self.brightness[c]),
        }
    }
}

impl Config {
    /// System-wide config path
    const SYSTEM_CONFIG_PATH: &'static str = "/etc/crtcal/config.toml";

    /// Get the path that would be used for loading config
    /// Returns None if using built-in defaults
    pub fn config_path() -> Option<PathBuf> {
        // 1. CRTCAL_CONFIG environment variable
        if let Ok(path) = std::env::var("CRTCAL_CONFIG") {
            let p = Path::new(&path);
            if p.exists() {
                return Some(p.to_path_buf());
            }
        }

        // 2. User config: ~/.config/crtcal/config.toml
        if let Some(config_path) = default_config_path() {
            if config_path.exists() {
                return Some(config_path);
            }
        }

        // 3. System config
        let system_config = Path::new(Self::SYSTEM_CONFIG_PATH);
        if system_config.exists() {
            return Some(system_config.to_path_buf());
        }

        None
    }

    /// Load configuration with priority:
    /// 1. CRTCAL_CONFIG environment variable
    /// 2. ~/.config/crtcal/config.toml (user config)
    /// 3. /etc/crtcal/config.toml (system config)
    /// 4. Built-in defaults
    pub fn load() -> Self {
        if let Some(path) = Self::config_path() {
            match Self::load_from_file(&path) {
                Ok(config) => {
                    info!("Loaded config: {}", path.display());
                    return config;
                }
                Err(e) => {
                    warn!("Failed to load config {}: {:#}", path.display(), e);
                }
            }
        }
        info!("Using built-in default config");
        Self::default()
    }

    /// Load settings from specified path
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse settings from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Write the default config to the user config path
    ///
    /// Refuses to overwrite an existing file unless `force` is set.
    pub fn write_default_config(force: bool) -> Result<PathBuf> {
        let config_path =
            default_config_path().ok_or_else(|| anyhow::anyhow!("Config directory not found"))?;
        if config_path.exists() && !force {
            anyhow::bail!(
                "Config file already exists: {} (use --force)",
                config_path.display()
            );
        }
        if let Some(dir) = config_path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create {}", dir.display()))?;
        }

        let content = format!(
            "# crtcal configuration\n\
             # Calibration arrays are [red, green, blue].\n\
             # Add [[calibration.monitor]] tables with an `edid` key to\n\
             # override the defaults for one monitor.\n\n{}",
            toml::to_string_pretty(&Self::default())?
        );
        std::fs::write(&config_path, content)
            .with_context(|| format!("Cannot write {}", config_path.display()))?;
        Ok(config_path)
    }
}

/// Get default config file path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crtcal").join("config.toml"))
}
