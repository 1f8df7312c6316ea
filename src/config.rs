//! Configuration management for CrabCapture
//!
//! Loads and saves the format negotiation constraints, session worker settings
//! and photo defaults as TOML.

use crate::device_model::{DeviceModel, ZoomOverride};
use crate::errors::CameraError;
use crate::types::{FlashMode, PhotoSettings, SelectionCriteria};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CrabCaptureConfig {
    pub selection: SelectionCriteria,
    pub session: SessionConfig,
    pub photo: PhotoConfig,
}

/// Session controller configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the serial worker thread
    pub worker_thread_name: String,
    /// How long blocking configuration waits for the worker, in milliseconds
    pub configure_timeout_ms: u64,
    /// How long shutdown waits for the worker to exit, in milliseconds
    pub shutdown_timeout_ms: u64,
    /// Zoom factor applied right after configuration on specific models
    #[serde(default)]
    pub zoom_overrides: Vec<ZoomOverride>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            worker_thread_name: "crabcapture-session".to_string(),
            configure_timeout_ms: 5000,
            shutdown_timeout_ms: 1000,
            zoom_overrides: Vec::new(),
        }
    }
}

impl SessionConfig {
    pub fn configure_timeout(&self) -> Duration {
        Duration::from_millis(self.configure_timeout_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

/// Default photo capture settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoConfig {
    pub flash_mode: FlashMode,
    pub high_resolution: bool,
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            flash_mode: FlashMode::Off,
            high_resolution: true,
        }
    }
}

impl PhotoConfig {
    pub fn settings(&self) -> PhotoSettings {
        PhotoSettings {
            flash_mode: self.flash_mode,
            high_resolution: self.high_resolution,
        }
    }
}

impl CrabCaptureConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CameraError> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            CameraError::ConfigurationError(format!("Failed to read config file: {}", e))
        })?;

        let config: CrabCaptureConfig = toml::from_str(&contents).map_err(|e| {
            CameraError::ConfigurationError(format!("Failed to parse config file: {}", e))
        })?;

        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), CameraError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    CameraError::ConfigurationError(format!(
                        "Failed to create config directory: {}",
                        e
                    ))
                })?;
            }
        }

        let toml_string = toml::to_string_pretty(self).map_err(|e| {
            CameraError::ConfigurationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, toml_string).map_err(|e| {
            CameraError::ConfigurationError(format!("Failed to write config file: {}", e))
        })?;

        log::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        PathBuf::from("crabcapture.toml")
    }

    /// Load from default location or fall back to defaults
    pub fn load_or_default() -> Self {
        Self::load_from_file(Self::default_path()).unwrap_or_else(|e| {
            log::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    pub fn validate(&self) -> Result<(), CameraError> {
        self.selection.validate()?;

        if self.session.worker_thread_name.is_empty() {
            return Err(CameraError::ConfigurationError(
                "Worker thread name must not be empty".to_string(),
            ));
        }
        if self.session.configure_timeout_ms == 0 {
            return Err(CameraError::ConfigurationError(
                "Configure timeout must be positive".to_string(),
            ));
        }
        for rule in &self.session.zoom_overrides {
            DeviceModel::parse(&rule.model)?;
            if !rule.factor.is_finite() || rule.factor < 1.0 {
                return Err(CameraError::ConfigurationError(format!(
                    "Zoom override for {} must be at least 1.0",
                    rule.model
                )));
            }
        }

        Ok(())
    }
}

lazy_static::lazy_static! {
    static ref GLOBAL_CONFIG: Arc<RwLock<CrabCaptureConfig>> =
        Arc::new(RwLock::new(CrabCaptureConfig::load_or_default()));
}

/// Current process-wide configuration
pub fn current_config() -> Result<CrabCaptureConfig, CameraError> {
    let config = GLOBAL_CONFIG
        .read()
        .map_err(|e| CameraError::ConfigurationError(e.to_string()))?;
    Ok(config.clone())
}

/// Replace the process-wide configuration after validating it
pub fn update_config(new_config: CrabCaptureConfig) -> Result<(), CameraError> {
    new_config.validate()?;
    let mut config = GLOBAL_CONFIG
        .write()
        .map_err(|e| CameraError::ConfigurationError(e.to_string()))?;
    *config = new_config;
    Ok(())
}

pub fn reset_config() -> Result<CrabCaptureConfig, CameraError> {
    let defaults = CrabCaptureConfig::default();
    let mut config = GLOBAL_CONFIG
        .write()
        .map_err(|e| CameraError::ConfigurationError(format!("Failed to write config: {}", e)))?;
    *config = defaults.clone();
    Ok(defaults)
}
