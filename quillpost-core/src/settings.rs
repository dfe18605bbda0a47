//! Settings persistence module
//!
//! Saves and loads client settings to/from disk. The two service URLs can
//! also be overridden from the environment.

use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const SETTINGS_FILE: &str = "settings.json";
const APP_NAME: &str = "QuillPost";

pub const AUTH_API_URL_ENV: &str = "QUILLPOST_AUTH_API_URL";
pub const BLOG_API_URL_ENV: &str = "QUILLPOST_BLOG_API_URL";

/// Client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Base URL of the identity service (token, refresh, register, profile)
    #[serde(default = "default_auth_api_url")]
    pub auth_api_url: String,
    /// Base URL of the blog (resource) service
    #[serde(default = "default_blog_api_url")]
    pub blog_api_url: String,
    /// Per-request timeout handed to the HTTP client
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_auth_api_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_blog_api_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("QuillPost/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            auth_api_url: default_auth_api_url(),
            blog_api_url: default_blog_api_url(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientSettings {
    /// Apply URL overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(
            std::env::var(AUTH_API_URL_ENV).ok(),
            std::env::var(BLOG_API_URL_ENV).ok(),
        )
    }

    fn with_overrides(mut self, auth: Option<String>, blog: Option<String>) -> Self {
        if let Some(url) = auth.filter(|u| !u.trim().is_empty()) {
            debug!("Identity service URL overridden: {}", url);
            self.auth_api_url = url;
        }
        if let Some(url) = blog.filter(|u| !u.trim().is_empty()) {
            debug!("Blog service URL overridden: {}", url);
            self.blog_api_url = url;
        }
        self
    }
}

/// Get the settings directory path
fn get_settings_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_NAME))
}

/// Get the full path to the settings file
pub fn get_settings_path() -> Option<PathBuf> {
    get_settings_dir().map(|p| p.join(SETTINGS_FILE))
}

/// Load settings from the default location, then apply environment overrides
pub fn load_settings() -> ClientSettings {
    let settings = match get_settings_path() {
        Some(path) => load_settings_from(&path),
        None => {
            debug!("Could not determine settings path, using defaults");
            ClientSettings::default()
        }
    };
    settings.with_env_overrides()
}

/// Load settings from a specific file. Never fails; falls back to defaults.
pub fn load_settings_from(path: &Path) -> ClientSettings {
    if !path.exists() {
        debug!("Settings file does not exist, using defaults");
        return ClientSettings::default();
    }

    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => {
                info!("Loaded settings from {:?}", path);
                settings
            }
            Err(e) => {
                error!("Failed to parse settings file: {}", e);
                ClientSettings::default()
            }
        },
        Err(e) => {
            error!("Failed to read settings file: {}", e);
            ClientSettings::default()
        }
    }
}

/// Save settings to the default location
pub fn save_settings(settings: &ClientSettings) -> Result<(), String> {
    match get_settings_path() {
        Some(path) => save_settings_to(settings, &path),
        None => Err("Could not determine settings directory".to_string()),
    }
}

/// Save settings to a specific file, creating its directory if needed
pub fn save_settings_to(settings: &ClientSettings, path: &Path) -> Result<(), String> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .map_err(|e| format!("Failed to create settings directory: {}", e))?;
        }
    }

    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| format!("Failed to serialize settings: {}", e))?;

    match fs::write(path, json) {
        Ok(_) => {
            info!("Saved settings to {:?}", path);
            Ok(())
        }
        Err(e) => Err(format!("Failed to write settings file: {}", e)),
    }
}
