//! Layered configuration.
//!
//! Precedence, lowest first:
//! 1. Programmed defaults (`BrokerSettings::default()`)
//! 2. User config file (`$XDG_CONFIG_HOME/callwire/callwire.toml`), or an
//!    explicit file passed by the caller
//! 3. `CALLWIRE_ENDPOINT` environment variable
//!
//! Command-line flags are applied on top by the binary.

pub mod settings;
pub mod user;

use std::path::Path;

pub use settings::{BrokerSettings, DEFAULT_ENDPOINT, SettingsFile};
pub use user::{load_settings_file, load_user_config, user_config_path};

use crate::error::ConfigError;

/// Environment variable overriding the endpoint.
pub const ENDPOINT_ENV: &str = "CALLWIRE_ENDPOINT";

/// Resolve settings from every layer.
///
/// `config_file` replaces the user config file when given; unlike the user
/// file, an explicit file must exist.
pub fn load_settings(config_file: Option<&Path>) -> Result<BrokerSettings, ConfigError> {
    let mut settings = BrokerSettings::default();

    let file_layer = match config_file {
        Some(path) => Some(load_settings_file(path)?.ok_or_else(|| ConfigError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "config file not found"),
        })?),
        None => load_user_config()?,
    };
    if let Some(layer) = file_layer {
        log::debug!(target: "callwire::config", "Applying config file layer: {:?}", layer);
        settings.apply(layer);
    }

    if let Some(endpoint) = std::env::var(ENDPOINT_ENV).ok().filter(|v| !v.is_empty()) {
        log::debug!(
            target: "callwire::config",
            "Endpoint overridden by {}: {}",
            ENDPOINT_ENV,
            endpoint
        );
        settings.endpoint = endpoint;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    /// Point XDG_CONFIG_HOME at an empty dir and clear the endpoint override.
    fn isolated_env<T>(f: impl FnOnce() -> T) -> T {
        let empty = TempDir::new().expect("failed to create temp dir");
        let original_xdg = env::var_os("XDG_CONFIG_HOME");
        let original_endpoint = env::var_os(ENDPOINT_ENV);
        // SAFETY: #[serial(xdg_env)] prevents concurrent modification of these variables
        unsafe {
            env::set_var("XDG_CONFIG_HOME", empty.path());
            env::remove_var(ENDPOINT_ENV);
        }
        let result = f();
        // SAFETY: same as above, restoring original env state
        unsafe {
            match original_xdg {
                Some(value) => env::set_var("XDG_CONFIG_HOME", value),
                None => env::remove_var("XDG_CONFIG_HOME"),
            }
            match original_endpoint {
                Some(value) => env::set_var(ENDPOINT_ENV, value),
                None => env::remove_var(ENDPOINT_ENV),
            }
        }
        result
    }

    #[test]
    #[serial(xdg_env)]
    fn no_layers_yields_defaults() {
        let settings = isolated_env(|| load_settings(None)).unwrap();
        assert_eq!(settings, BrokerSettings::default());
    }

    #[test]
    #[serial(xdg_env)]
    fn explicit_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "requestTimeoutMs = 1500\nqueueUntilConnected = true\n").unwrap();

        let settings = isolated_env(|| load_settings(Some(&path))).unwrap();

        assert_eq!(settings.request_timeout_ms, 1500);
        assert!(settings.queue_until_connected);
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    #[serial(xdg_env)]
    fn explicit_missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");

        let err = isolated_env(|| load_settings(Some(&path))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    #[serial(xdg_env)]
    fn endpoint_env_overrides_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "endpoint = \"http://from-file:1337\"\n").unwrap();

        let settings = isolated_env(|| {
            // SAFETY: #[serial(xdg_env)] prevents concurrent modification
            unsafe {
                env::set_var(ENDPOINT_ENV, "http://from-env:4000");
            }
            load_settings(Some(&path))
        })
        .unwrap();

        assert_eq!(settings.endpoint, "http://from-env:4000");
        assert_eq!(settings.socket_addr().unwrap(), "from-env:4000");
    }
}
