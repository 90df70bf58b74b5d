//! Durable settings: the selected device address and the channel variant
//!
//! Stored as a small JSON document keyed the same way the browser
//! extension's local storage is (`rokuIp`, `rokuAppId`). There is no schema
//! version; unknown keys are ignored and missing keys read as unset.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Address of the most recently selected device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roku_ip: Option<String>,
    /// Channel variant, `"0"` for the primary channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roku_app_id: Option<String>,
}

impl Settings {
    /// Load settings from a file
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings or start empty if the file doesn't exist
    pub fn load_or_default(path: &Path) -> Result<Self, SettingsError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// File-backed settings store
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current settings
    pub fn load(&self) -> Result<Settings, SettingsError> {
        Settings::load_or_default(&self.path)
    }

    /// The saved device address, if any
    pub fn device_ip(&self) -> Result<Option<String>, SettingsError> {
        Ok(self.load()?.roku_ip)
    }

    /// Persist the selected device address, keeping the other keys
    pub fn set_device_ip(&self, ip: &str) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        settings.roku_ip = Some(ip.to_string());
        settings.save(&self.path)?;
        info!(ip = %ip, path = %self.path.display(), "Saved selected device");
        Ok(settings)
    }

    /// Persist the channel variant, keeping the other keys
    pub fn set_app_id(&self, app_id: &str) -> Result<Settings, SettingsError> {
        let mut settings = self.load()?;
        settings.roku_app_id = Some(app_id.to_string());
        settings.save(&self.path)?;
        debug!(app_id = %app_id, "Saved channel variant");
        Ok(settings)
    }
}
