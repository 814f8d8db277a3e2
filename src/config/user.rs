//! User configuration loading for callwire.
//!
//! User config location: $XDG_CONFIG_HOME/callwire/callwire.toml
//! Fallback: the platform config directory (`~/.config` on Linux).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::settings::SettingsFile;
use crate::error::ConfigError;

/// Returns the path to the user configuration file.
///
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/callwire/callwire.toml
/// 2. Otherwise: <platform config dir>/callwire/callwire.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME") {
        Some(xdg_config) if !xdg_config.is_empty() => PathBuf::from(xdg_config),
        _ => dirs::config_dir()?,
    };
    Some(base.join("callwire").join("callwire.toml"))
}

/// Load one settings layer from `path`.
///
/// A missing file is not an error and yields `None`.
pub fn load_settings_file(path: &Path) -> Result<Option<SettingsFile>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Load the user configuration layer, if any.
pub fn load_user_config() -> Result<Option<SettingsFile>, ConfigError> {
    match user_config_path() {
        Some(path) => load_settings_file(&path),
        None => Ok(None),
    }
}
