//! Config directory discovery and settings file loading.
//!
//! The config directory is `$YTM_CONFIG_DIR` when set, otherwise the platform
//! config dir joined with `ytm` (`~/.config/ytm` on Linux).

use std::path::{Path, PathBuf};

use crate::{ClientSettings, ConfigError, Result};

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "YTM_CONFIG_DIR";

/// Application name for directory resolution.
const APP_NAME: &str = "ytm";

/// Settings filename within the config directory.
const SETTINGS_FILE: &str = "settings.yaml";

/// Get the config directory.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Get the path of the settings file.
pub fn settings_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join(SETTINGS_FILE))
}

/// Load settings from the default location.
///
/// Returns defaults if the file doesn't exist.
pub fn load_settings() -> Result<ClientSettings> {
    load_settings_from(settings_path().as_deref())
}

/// Load settings from a specific path.
pub fn load_settings_from(path: Option<&Path>) -> Result<ClientSettings> {
    let Some(path) = path else {
        return Ok(ClientSettings::default());
    };

    if !path.exists() {
        tracing::debug!(path = %path.display(), "settings file not found, using defaults");
        return Ok(ClientSettings::default());
    }

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;

    ClientSettings::from_yaml(&contents)
}

/// Save settings to the default location.
pub fn save_settings(settings: &ClientSettings) -> Result<()> {
    let path = settings_path()
        .ok_or_else(|| ConfigError::Other("Could not determine config directory".to_string()))?;
    save_settings_to(settings, &path)
}

/// Save settings to a specific path, creating parent directories.
pub fn save_settings_to(settings: &ClientSettings, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = settings.to_yaml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_returns_defaults() {
        let temp = tempdir().unwrap();
        let settings = load_settings_from(Some(&temp.path().join("nope.yaml"))).unwrap();
        assert_eq!(settings, ClientSettings::default());
    }

    #[test]
    fn test_load_none_returns_defaults() {
        assert_eq!(load_settings_from(None).unwrap(), ClientSettings::default());
    }

    #[test]
    fn test_save_and_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join(SETTINGS_FILE);

        let settings = ClientSettings {
            default_backend: Some("https://yt.example".to_string()),
            timeout: 5,
            ..Default::default()
        };
        save_settings_to(&settings, &path).unwrap();

        let loaded = load_settings_from(Some(&path)).unwrap();
        assert_eq!(loaded, settings);
    }
}
