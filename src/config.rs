use crate::error::{ErrorContext, UploaderError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable that overrides the configured server URL.
pub const SERVER_URL_ENV: &str = "LAUNCHPAD_UPLOADER_SERVER";

const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:5000";
const CONFIG_DIR_NAME: &str = "launchpad-uploader";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(rename = "serverUrl")]
    pub server_url: String,
    #[serde(rename = "windowWidth")]
    pub window_width: f32,
    #[serde(rename = "windowHeight")]
    pub window_height: f32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            window_width: 640.0,
            window_height: 720.0,
        }
    }
}

impl AppConfig {
    /// Applies `LAUNCHPAD_UPLOADER_SERVER` when it is set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(SERVER_URL_ENV) {
            let url = url.trim();
            if !url.is_empty() {
                debug!(server_url = url, "Server URL taken from environment");
                self.server_url = url.to_string();
            }
        }
        self
    }
}

pub fn get_config_dir() -> Result<PathBuf, UploaderError> {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .ok_or_else(|| UploaderError::Config("Could not find config directory".to_string()))
}

pub fn get_config_file_path() -> Result<PathBuf, UploaderError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Loads the user config, falling back to defaults when the file is absent.
pub fn load_config() -> Result<AppConfig, UploaderError> {
    let path = get_config_file_path()?;
    Ok(load_config_from(&path)?.with_env_overrides())
}

pub fn load_config_from(path: &Path) -> Result<AppConfig, UploaderError> {
    if !path.exists() {
        info!(path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path).context("Failed to read config file")?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| UploaderError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(config)
}

pub fn save_config(config: &AppConfig) -> Result<(), UploaderError> {
    save_config_to(&get_config_file_path()?, config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), UploaderError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create config directory")?;
    }
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).context("Failed to write config file")?;
    Ok(())
}

/// Saves the config, logging instead of failing; the UI keeps working without persistence.
pub fn persist(config: &AppConfig) {
    if let Err(e) = save_config(config) {
        warn!("Failed to save config: {}", e);
    }
}
