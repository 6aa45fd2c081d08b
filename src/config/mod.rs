use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigPathError {
    MissingHomeDirectory,
}

pub(crate) const APP_DIR: &str = "backdrop";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_WALLPAPER: &str = "images/wallpaper.png";
const DEFAULT_ASSET_BASE: &str = "/";
const DEFAULT_THEME_STYLESHEET: &str = "/themes/default.css";
const DEFAULT_DEBOUNCE_MS: u64 = 100;
// Practical per-origin ceiling of browser local storage.
const DEFAULT_STORE_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub default_wallpaper: String,
    pub asset_base: String,
    /// Href of the default theme's stylesheet; other themes sit beside it.
    pub default_theme_stylesheet: String,
    pub live_preview_debounce_ms: u64,
    pub store_quota_bytes: Option<usize>,
    pub store_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_wallpaper: DEFAULT_WALLPAPER.to_string(),
            asset_base: DEFAULT_ASSET_BASE.to_string(),
            default_theme_stylesheet: DEFAULT_THEME_STYLESHEET.to_string(),
            live_preview_debounce_ms: DEFAULT_DEBOUNCE_MS,
            store_quota_bytes: Some(DEFAULT_STORE_QUOTA_BYTES),
            store_file: None,
        }
    }
}

impl AppConfig {
    pub fn live_preview_debounce(&self) -> Duration {
        Duration::from_millis(self.live_preview_debounce_ms)
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref())
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = config_root(xdg_config_home, home)?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

fn config_root(
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_config_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(".config"))
}
